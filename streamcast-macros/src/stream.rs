use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    FnArg, Ident, ItemTrait, LitStr, Pat, PatIdent, ReturnType, Token, TraitItem, TraitItemFn,
    Type, TypeParamBound, WherePredicate,
    parse::{Parse, ParseStream},
    parse_quote,
};

pub(crate) struct StreamArgs {
    name: Option<LitStr>,
}

impl Parse for StreamArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut name = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "name" => name = Some(input.parse()?),
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", other),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(StreamArgs { name })
    }
}

pub(crate) fn expand(args: StreamArgs, mut item: ItemTrait) -> syn::Result<TokenStream> {
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "stream traits cannot be generic",
        ));
    }
    check_supertraits(&item)?;
    if item.colon_token.is_none() {
        item.colon_token = Some(Token![:](item.ident.span()));
    }
    if !has_supertrait(&item, "Send") {
        item.supertraits.push(parse_quote!(::core::marker::Send));
    }
    if !has_supertrait(&item, "Sync") {
        item.supertraits.push(parse_quote!(::core::marker::Sync));
    }

    let ident = item.ident.clone();
    let name = args
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));

    let mut forwards = Vec::new();
    for trait_item in &mut item.items {
        match trait_item {
            TraitItem::Fn(method) => {
                let fallible = take_fallible(method)?;
                if let Some(forward) = forward_method(&ident, method, fallible)? {
                    forwards.push(forward);
                }
            }
            TraitItem::Const(constant) if constant.default.is_none() => {
                return Err(syn::Error::new_spanned(
                    constant,
                    "stream trait constants need a default value",
                ));
            }
            TraitItem::Type(ty) => {
                return Err(syn::Error::new_spanned(
                    ty,
                    "stream traits cannot have associated types",
                ));
            }
            _ => {}
        }
    }

    Ok(quote! {
        #item

        impl ::streamcast::StreamKind for dyn #ident {
            const NAME: &'static str = #name;
        }

        impl #ident for ::streamcast::DispatchHandle<dyn #ident> {
            #(#forwards)*
        }
    })
}

fn has_supertrait(item: &ItemTrait, marker: &str) -> bool {
    item.supertraits.iter().any(|bound| match bound {
        TypeParamBound::Trait(bound) => bound
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == marker),
        _ => false,
    })
}

fn check_supertraits(item: &ItemTrait) -> syn::Result<()> {
    for bound in &item.supertraits {
        let TypeParamBound::Trait(bound) = bound else {
            continue;
        };
        let marker = bound
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Send" || segment.ident == "Sync");
        if !marker {
            return Err(syn::Error::new_spanned(
                bound,
                "stream traits can only require `Send` and `Sync`",
            ));
        }
    }
    Ok(())
}

/// Strip the `#[fallible]` marker, which forces `try_invoke` for results
/// hidden behind an alias.
fn take_fallible(method: &mut TraitItemFn) -> syn::Result<bool> {
    let before = method.attrs.len();
    let mut marker = None;
    method.attrs.retain(|attr| {
        if attr.path().is_ident("fallible") {
            marker = Some(attr.clone());
            false
        } else {
            true
        }
    });
    if let Some(attr) = marker {
        attr.meta.require_path_only()?;
        if matches!(method.sig.output, ReturnType::Default) {
            return Err(syn::Error::new_spanned(
                attr,
                "`#[fallible]` methods must return a `Result`",
            ));
        }
    }
    Ok(method.attrs.len() != before)
}

fn requires_sized(method: &TraitItemFn) -> bool {
    let Some(where_clause) = &method.sig.generics.where_clause else {
        return false;
    };
    where_clause.predicates.iter().any(|predicate| {
        let WherePredicate::Type(predicate) = predicate else {
            return false;
        };
        let self_bound =
            matches!(&predicate.bounded_ty, Type::Path(path) if path.path.is_ident("Self"));
        self_bound
            && predicate.bounds.iter().any(|bound| {
                matches!(bound, TypeParamBound::Trait(bound)
                    if bound.path.segments.last().is_some_and(|s| s.ident == "Sized"))
            })
    })
}

/// Build the handle-side implementation of one trait method.
///
/// Returns `None` for methods only callable on sized implementors that
/// already have a default body.
fn forward_method(
    trait_ident: &Ident,
    method: &TraitItemFn,
    fallible: bool,
) -> syn::Result<Option<TokenStream>> {
    if requires_sized(method) {
        if method.default.is_some() {
            return Ok(None);
        }
        return Err(syn::Error::new_spanned(
            &method.sig,
            "methods requiring `Self: Sized` need a default body in stream traits",
        ));
    }
    if let Some(asyncness) = &method.sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "stream trait methods cannot be async",
        ));
    }
    if method.sig.generics.type_params().next().is_some()
        || method.sig.generics.const_params().next().is_some()
    {
        return Err(syn::Error::new_spanned(
            &method.sig.generics,
            "stream trait methods cannot have type or const parameters",
        ));
    }

    let mut sig = method.sig.clone();
    let mut names = Vec::new();
    let mut passes = Vec::new();
    for (index, input) in sig.inputs.iter_mut().enumerate() {
        match input {
            FnArg::Receiver(receiver) => {
                if receiver.reference.is_none() || receiver.mutability.is_some() {
                    return Err(syn::Error::new_spanned(
                        receiver,
                        "stream trait methods must take `&self`",
                    ));
                }
            }
            FnArg::Typed(arg) => {
                let name = format_ident!("__arg{}", index);
                let pass = match &*arg.ty {
                    Type::Reference(reference) if reference.mutability.is_some() => {
                        return Err(syn::Error::new_spanned(
                            &arg.ty,
                            "stream trait methods cannot take `&mut` arguments",
                        ));
                    }
                    Type::Reference(_) => quote! { #name },
                    _ => quote! { ::core::clone::Clone::clone(&#name) },
                };
                arg.pat = Box::new(Pat::Ident(PatIdent {
                    attrs: Vec::new(),
                    by_ref: None,
                    mutability: None,
                    ident: name.clone(),
                    subpat: None,
                }));
                arg.attrs.clear();
                names.push(name);
                passes.push(pass);
            }
        }
    }
    if !matches!(sig.inputs.first(), Some(FnArg::Receiver(_))) {
        return Err(syn::Error::new_spanned(
            &method.sig,
            "stream trait methods must take `&self`",
        ));
    }

    let fn_ident = &sig.ident;
    let method_name = fn_ident.to_string();
    let invoke = if fallible || returns_result(&sig.output) {
        quote! { try_invoke }
    } else {
        quote! { invoke }
    };

    Ok(Some(quote! {
        #sig {
            static __METHOD: ::streamcast::Method = ::streamcast::Method::new(#method_name);
            let __args: &[&dyn ::core::fmt::Debug] = &[#(&#names),*];
            self.#invoke(&__METHOD, ::streamcast::Args::new(__args), |__stream| {
                #trait_ident::#fn_ident(__stream, #(#passes),*)
            })
        }
    }))
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "Result"),
            _ => false,
        },
        ReturnType::Default => false,
    }
}
