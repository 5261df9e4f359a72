use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::parse::Parser;

use crate::parse::*;

// syn::AttributeArgs does not implement syn::Parse
type AttributeArgs = syn::punctuated::Punctuated<syn::Meta, syn::Token![,]>;

const KNOWN_ATTRIBUTES: &str = "`worker_threads`, `thread_name`";

/// Expands
///
/// ```rust,no_run
/// #[tessera::main(worker_threads = 2)]
/// async fn main() {
///     println!("Hello world");
/// }
/// ```
///
/// into a plain `fn main` that builds a thread pool and blocks on the body.
pub(crate) fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    // If any of the steps for this macro fail, we still want to expand to an
    // item that is as close to the expected output as possible, so IDE
    // completion keeps working.
    let input: ItemFn = match syn::parse2(item.clone()) {
        Ok(it) => it,
        Err(e) => return token_stream_with_error(item, e),
    };

    let config = if input.sig.ident == "main" && !input.sig.inputs.is_empty() {
        let msg = "the main function cannot accept arguments";
        Err(syn::Error::new_spanned(&input.sig.ident, msg))
    } else {
        AttributeArgs::parse_terminated
            .parse2(args)
            .and_then(|args| build_config(&input, args, false))
    };

    match config {
        Ok(config) => parse_knobs(input, false, config),
        Err(e) => token_stream_with_error(parse_knobs(input, false, Config::default()), e),
    }
}

pub(crate) fn test(args: TokenStream, item: TokenStream) -> TokenStream {
    let input: ItemFn = match syn::parse2(item.clone()) {
        Ok(it) => it,
        Err(e) => return token_stream_with_error(item, e),
    };

    let config = if let Some(attr) = input.attrs().find(|attr| is_test_attribute(attr)) {
        let msg = "second test attribute is supplied, consider removing or changing the order of your test attributes";
        Err(syn::Error::new_spanned(attr, msg))
    } else {
        AttributeArgs::parse_terminated
            .parse2(args)
            .and_then(|args| build_config(&input, args, true))
    };

    match config {
        Ok(config) => parse_knobs(input, true, config),
        Err(e) => token_stream_with_error(parse_knobs(input, true, Config::default()), e),
    }
}

#[derive(Default)]
struct Config {
    worker_threads: Option<usize>,
    thread_name: Option<String>,
}

impl Config {
    fn set_worker_threads(&mut self, lit: syn::Lit, span: Span) -> Result<(), syn::Error> {
        if self.worker_threads.is_some() {
            return Err(syn::Error::new(
                span,
                "`worker_threads` set multiple times.",
            ));
        }

        let worker_threads = parse_int(lit, span, "worker_threads")?;
        if worker_threads == 0 {
            return Err(syn::Error::new(span, "`worker_threads` may not be 0."));
        }
        self.worker_threads = Some(worker_threads);

        Ok(())
    }

    fn set_thread_name(&mut self, lit: syn::Lit, span: Span) -> Result<(), syn::Error> {
        if self.thread_name.is_some() {
            return Err(syn::Error::new(span, "`thread_name` set multiple times."));
        }

        self.thread_name = Some(parse_string(lit, span, "thread_name")?);
        Ok(())
    }
}

fn build_config(input: &ItemFn, args: AttributeArgs, is_test: bool) -> Result<Config, syn::Error> {
    if input.sig.asyncness.is_none() {
        let msg = "the `async` keyword is missing from the function declaration";
        return Err(syn::Error::new_spanned(input.sig.fn_token, msg));
    }

    let macro_name = if is_test { "tessera::test" } else { "tessera::main" };
    let mut config = Config::default();

    for arg in args {
        match arg {
            syn::Meta::NameValue(namevalue) => {
                let ident = namevalue
                    .path
                    .get_ident()
                    .ok_or_else(|| {
                        syn::Error::new_spanned(&namevalue, "Must have specified ident")
                    })?
                    .to_string()
                    .to_lowercase();
                let lit = match &namevalue.value {
                    syn::Expr::Lit(syn::ExprLit { lit, .. }) => lit,
                    expr => return Err(syn::Error::new_spanned(expr, "Must be a literal")),
                };
                let span = syn::spanned::Spanned::span(lit);
                match ident.as_str() {
                    "worker_threads" => config.set_worker_threads(lit.clone(), span)?,
                    "thread_name" => config.set_thread_name(lit.clone(), span)?,
                    name => {
                        let msg = format!(
                            "Unknown attribute {name} is specified; expected one of: {KNOWN_ATTRIBUTES}",
                        );
                        return Err(syn::Error::new_spanned(namevalue, msg));
                    }
                }
            }
            syn::Meta::Path(path) => {
                let name = path
                    .get_ident()
                    .ok_or_else(|| syn::Error::new_spanned(&path, "Must have specified ident"))?
                    .to_string()
                    .to_lowercase();
                let msg = match name.as_str() {
                    "worker_threads" | "thread_name" => {
                        format!("The `{name}` attribute requires an argument, e.g. #[{macro_name}({name} = ..)].")
                    }
                    name => {
                        format!("Unknown attribute {name} is specified; expected one of: {KNOWN_ATTRIBUTES}.")
                    }
                };
                return Err(syn::Error::new_spanned(path, msg));
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "Unknown attribute inside the macro",
                ));
            }
        }
    }

    Ok(config)
}

fn parse_knobs(mut input: ItemFn, is_test: bool, config: Config) -> TokenStream {
    input.sig.asyncness = None;

    // If type mismatch occurs, the current rustc points to the last statement.
    let (last_stmt_start_span, last_stmt_end_span) = {
        let mut last_stmt = input.stmts.last().cloned().unwrap_or_default().into_iter();

        // `Span` on stable only points to the first token; use the first and
        // last tokens like `syn::Error::new_spanned` does.
        let start = last_stmt.next().map_or_else(Span::call_site, |t| t.span());
        let end = last_stmt.last().map_or(start, |t| t.span());
        (start, end)
    };

    let mut pool = quote_spanned! {last_stmt_start_span=>
        tessera::runtime::Builder::new()
    };

    if let Some(v) = config.worker_threads {
        pool = quote_spanned! {last_stmt_start_span=> #pool.worker_threads(#v) };
    }

    if let Some(name) = config.thread_name {
        pool = quote_spanned! {last_stmt_start_span=> #pool.thread_name(#name) };
    }

    let generated_attrs = if is_test {
        quote! {
            #[::core::prelude::v1::test]
        }
    } else {
        quote! {}
    };

    let output_type = match &input.sig.output {
        // For functions with no return value syn doesn't print anything, but
        // the boxed future still needs an `Output`.
        syn::ReturnType::Default => quote! { () },
        syn::ReturnType::Type(_, ret_type) => quote! { #ret_type },
    };

    // The pool runs the body on its workers, so it must be `Send + 'static`:
    // box it behind an explicit type so errors point at the body.
    let body = input.body();
    let body = quote! {
        let body: ::core::pin::Pin<
            ::std::boxed::Box<dyn ::core::future::Future<Output = #output_type> + ::core::marker::Send>,
        > = ::std::boxed::Box::pin(async move #body);
    };

    // This explicit `return` is intentional. See tokio-rs/tokio#4636
    let last_block = quote_spanned! {last_stmt_end_span=>
        #[allow(clippy::expect_used, clippy::diverging_sub_expression, clippy::needless_return)]
        {
            return #pool
                .try_build()
                .expect("Failed building the thread pool")
                .block_on(body);
        }
    };

    input.into_tokens(generated_attrs, quote! { #body #last_block })
}
