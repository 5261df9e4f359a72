use proc_macro2::{Span, TokenStream, TokenTree};
use quote::ToTokens;
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Signature, Visibility, braced};

pub(crate) fn parse_string(lit: syn::Lit, span: Span, field: &str) -> Result<String, syn::Error> {
    match lit {
        syn::Lit::Str(s) => Ok(s.value()),
        _ => Err(syn::Error::new(
            span,
            format!("Failed to parse value of `{field}` as string."),
        )),
    }
}

pub(crate) fn parse_int(lit: syn::Lit, span: Span, field: &str) -> Result<usize, syn::Error> {
    match lit {
        syn::Lit::Int(lit) => lit.base10_parse::<usize>().map_err(|e| {
            syn::Error::new(
                span,
                format!("Failed to parse value of `{field}` as integer: {e}"),
            )
        }),
        _ => Err(syn::Error::new(
            span,
            format!("Failed to parse value of `{field}` as integer."),
        )),
    }
}

/// Matches `#[test]`, `#[core::prelude::*::test]` and `#[std::prelude::*::test]`.
pub(crate) fn is_test_attribute(attr: &Attribute) -> bool {
    let syn::Meta::Path(path) = &attr.meta else {
        return false;
    };

    if path.leading_colon.is_none() && path.is_ident("test") {
        return true;
    }

    let candidates = [
        ["core", "prelude", "*", "test"],
        ["std", "prelude", "*", "test"],
    ];
    path.segments.len() == candidates[0].len()
        && candidates.into_iter().any(|segments| {
            path.segments.iter().zip(segments).all(|(segment, expected)| {
                segment.arguments.is_none() && (expected == "*" || segment.ident == expected)
            })
        })
}

pub(crate) fn token_stream_with_error(mut tokens: TokenStream, error: syn::Error) -> TokenStream {
    tokens.extend(error.into_compile_error());
    tokens
}

/// What a task's body evaluates to, derived from the declared return type.
pub(crate) enum TaskOutput {
    /// `-> Result<T, E>` (or any alias named `Result`): the task yields `T`
    /// and `E` is converted into the task's failure.
    Fallible { ok: syn::Type },

    /// Any other return type, `()` when omitted. The task never fails except
    /// by panicking.
    Infallible { ty: TokenStream },
}

impl TaskOutput {
    pub(crate) fn from_signature(sig: &Signature) -> Self {
        let ty = match &sig.output {
            syn::ReturnType::Default => {
                return TaskOutput::Infallible {
                    ty: quote::quote! { () },
                };
            }
            syn::ReturnType::Type(_, ty) => ty.as_ref(),
        };

        match result_ok_type(ty) {
            Some(ok) => TaskOutput::Fallible { ok: ok.clone() },
            None => TaskOutput::Infallible {
                ty: ty.to_token_stream(),
            },
        }
    }
}

/// Returns `T` if `ty` is a path ending in `Result<T, ..>`.
fn result_ok_type(ty: &syn::Type) -> Option<&syn::Type> {
    let syn::Type::Path(path) = ty else {
        return None;
    };
    let last = path.path.segments.last()?;
    if last.ident != "Result" {
        return None;
    }

    let syn::PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(ok) => Some(ok),
        _ => None,
    }
}

/// An `fn` item whose body is kept as raw statements: the entry macros only
/// rewrap the body, so parsing it fully would be wasted work.
pub(crate) struct ItemFn {
    pub(crate) outer_attrs: Vec<Attribute>,
    pub(crate) vis: Visibility,
    pub(crate) sig: Signature,
    pub(crate) brace_token: syn::token::Brace,
    pub(crate) inner_attrs: Vec<Attribute>,
    pub(crate) stmts: Vec<TokenStream>,
}

impl ItemFn {
    pub(crate) fn attrs(&self) -> impl Iterator<Item = &Attribute> {
        self.outer_attrs.iter().chain(self.inner_attrs.iter())
    }

    pub(crate) fn body(&self) -> Body<'_> {
        Body {
            brace_token: self.brace_token,
            stmts: &self.stmts,
        }
    }

    /// Emits the function with `generated_attrs` appended to its attributes
    /// and `body` as its new block.
    pub(crate) fn into_tokens(self, generated_attrs: TokenStream, body: TokenStream) -> TokenStream {
        let mut tokens = TokenStream::new();

        for attr in self.outer_attrs {
            attr.to_tokens(&mut tokens);
        }

        // Inner attributes are not allowed on the block we expand into, lift
        // them onto the function instead.
        for mut attr in self.inner_attrs {
            attr.style = syn::AttrStyle::Outer;
            attr.to_tokens(&mut tokens);
        }

        generated_attrs.to_tokens(&mut tokens);

        self.vis.to_tokens(&mut tokens);
        self.sig.to_tokens(&mut tokens);

        self.brace_token.surround(&mut tokens, |tokens| {
            body.to_tokens(tokens);
        });

        tokens
    }
}

impl Parse for ItemFn {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        let outer_attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        let sig: Signature = input.parse()?;

        let content;
        let brace_token = braced!(content in input);
        let inner_attrs = Attribute::parse_inner(&content)?;

        // Split on top-level `;` only, nested groups stay opaque token trees.
        let mut buf = TokenStream::new();
        let mut stmts = Vec::new();

        while !content.is_empty() {
            if let Some(semi) = content.parse::<Option<syn::Token![;]>>()? {
                semi.to_tokens(&mut buf);
                stmts.push(std::mem::take(&mut buf));
                continue;
            }

            buf.extend([content.parse::<TokenTree>()?]);
        }

        if !buf.is_empty() {
            stmts.push(buf);
        }

        Ok(Self {
            outer_attrs,
            vis,
            sig,
            brace_token,
            inner_attrs,
            stmts,
        })
    }
}

pub(crate) struct Body<'a> {
    brace_token: syn::token::Brace,
    // Statements, with terminating `;`.
    stmts: &'a [TokenStream],
}

impl ToTokens for Body<'_> {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        self.brace_token.surround(tokens, |tokens| {
            for stmt in self.stmts {
                stmt.to_tokens(tokens);
            }
        });
    }
}
