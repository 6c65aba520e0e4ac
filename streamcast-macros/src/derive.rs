use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Path, Token, punctuated::Punctuated};

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut facets: Vec<Path> = Vec::new();
    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("facets")) {
        let paths = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)?;
        for path in paths {
            if !facets.contains(&path) {
                facets.push(path);
            }
        }
    }

    let adds = facets.iter().map(|path| {
        quote! {
            facets.add::<dyn #path>(|stream| stream);
        }
    });

    Ok(quote! {
        impl #impl_generics ::streamcast::Stream for #name #ty_generics #where_clause {
            fn facets(facets: &mut ::streamcast::Facets<Self>) {
                let _ = &facets;
                #(#adds)*
            }
        }
    })
}
