use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::spanned::Spanned;

use crate::parse::{TaskOutput, token_stream_with_error};

/// Rewrites `async fn f(args) -> R { body }` into `fn f(args) -> Task<T>`,
/// where the body becomes the lazily started task.
pub(crate) fn task(args: TokenStream, item: TokenStream) -> TokenStream {
    let mut input: syn::ItemFn = match syn::parse2(item.clone()) {
        Ok(it) => it,
        Err(e) => return token_stream_with_error(item, e),
    };

    if let Err(e) = check(&args, &input) {
        return token_stream_with_error(item, e);
    }

    let output = TaskOutput::from_signature(&input.sig);
    let block = &input.block;
    let span = block.span();

    let (task_type, body) = match output {
        TaskOutput::Fallible { ok } => {
            let ret = match &input.sig.output {
                syn::ReturnType::Type(_, ty) => quote! { #ty },
                syn::ReturnType::Default => quote! { () },
            };
            let body = quote_spanned! {span=>
                let body: ::core::pin::Pin<
                    ::std::boxed::Box<dyn ::core::future::Future<Output = #ret> + ::core::marker::Send>,
                > = ::std::boxed::Box::pin(async move #block);

                tessera::Task::new(async move {
                    body.await.map_err(::core::convert::Into::into)
                })
            };
            (quote! { tessera::Task<#ok> }, body)
        }
        TaskOutput::Infallible { ty } => {
            let body = quote_spanned! {span=>
                let body: ::core::pin::Pin<
                    ::std::boxed::Box<dyn ::core::future::Future<Output = #ty> + ::core::marker::Send>,
                > = ::std::boxed::Box::pin(async move #block);

                tessera::Task::new(async move { ::core::result::Result::Ok(body.await) })
            };
            (quote! { tessera::Task<#ty> }, body)
        }
    };

    input.sig.asyncness = None;
    input.sig.output = syn::parse_quote! { -> #task_type };
    input.block = syn::parse_quote! {{ #body }};

    quote! { #input }
}

fn check(args: &TokenStream, input: &syn::ItemFn) -> Result<(), syn::Error> {
    if !args.is_empty() {
        return Err(syn::Error::new_spanned(
            args,
            "`tessera::task` does not take any arguments",
        ));
    }

    if input.sig.asyncness.is_none() {
        let msg = "the `async` keyword is missing from the function declaration";
        return Err(syn::Error::new_spanned(input.sig.fn_token, msg));
    }

    for arg in &input.sig.inputs {
        if let syn::FnArg::Receiver(receiver) = arg
            && receiver.reference.is_some()
        {
            let msg = "a task outlives the call that creates it and cannot borrow `self`; take `self` by value or clone what the body needs";
            return Err(syn::Error::new_spanned(receiver, msg));
        }
    }

    Ok(())
}
