use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, FnArg, ItemFn, Pat, PatType, Type};

fn formatted_arg_error_msg(arg_name: &str, arg_pos: usize, fn_name: &str) -> String {
    format!(
        "Expected argument {} ('{}') to be f64, for builtin {}",
        arg_pos, arg_name, fn_name
    )
}

/// Turns a native function with `f64` parameters into a builtin callback.
///
/// ```ignore
/// #[builtin]
/// fn atan(num: f64, num2: f64) -> Result<f64, BuiltinError> { ... }
/// ```
///
/// expands to `fn atan(args: &[f64]) -> Result<f64, BuiltinError>`, which
/// checks the argument count before binding `num` and `num2`, and to a
/// `ATAN_PARAMS` constant holding the parameter names. `BuiltinError` must be
/// in scope where the attribute is used.
/// Other attributes, doc comments included, stay on the generated function.
#[proc_macro_attribute]
pub fn builtin(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let vis = &input.vis;
    let fn_name = &input.sig.ident;
    let fn_body = &input.block;
    let fn_output = &input.sig.output;
    let fn_attrs = &input.attrs;
    let params_name = format_ident!("{}_PARAMS", fn_name.to_string().to_uppercase());

    let mut arg_extractions = Vec::new();
    let mut arg_names = Vec::new();

    for (i, arg) in input.sig.inputs.iter().enumerate() {
        let FnArg::Typed(PatType { pat, ty, .. }) = arg else {
            return syn::Error::new_spanned(arg, "builtins cannot take self")
                .to_compile_error()
                .into();
        };

        let arg_name = match **pat {
            Pat::Ident(ref ident) => &ident.ident,
            _ => {
                return syn::Error::new_spanned(pat, "unsupported argument pattern")
                    .to_compile_error()
                    .into()
            }
        };

        let is_f64 = matches!(**ty, Type::Path(ref type_path) if type_path.path.is_ident("f64"));
        if !is_f64 {
            let err_msg = formatted_arg_error_msg(&arg_name.to_string(), i, &fn_name.to_string());
            return syn::Error::new_spanned(ty, err_msg).to_compile_error().into();
        }

        arg_extractions.push(quote! {
            let #arg_name: f64 = args[#i];
        });
        arg_names.push(arg_name.to_string());
    }

    let args_len = arg_names.len();
    let expanded = quote! {
        #vis const #params_name: &[&str] = &[#(#arg_names),*];

        #(#fn_attrs)*
        #vis fn #fn_name(args: &[f64]) #fn_output {
            if args.len() != #args_len {
                return Err(BuiltinError::Arity {
                    expected: #args_len,
                    got: args.len(),
                });
            }

            #(#arg_extractions)*

            #fn_body
        }
    };

    TokenStream::from(expanded)
}
