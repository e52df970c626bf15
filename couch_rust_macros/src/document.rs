use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr};

pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let database = extract_database(input)?;
    let id_field = extract_field(input, "id")?;
    let rev_field = extract_field(input, "rev")?;

    Ok(quote! {
        impl #impl_generics ::couch_rust::Document for #name #ty_generics #where_clause {
            const DATABASE: &'static str = #database;

            fn id(&self) -> &str {
                &self.#id_field
            }

            fn set_id(&mut self, id: String) {
                self.#id_field = id;
            }

            fn rev(&self) -> Option<&str> {
                self.#rev_field.as_deref()
            }

            fn set_rev(&mut self, rev: Option<String>) {
                self.#rev_field = rev;
            }
        }
    })
}

fn extract_database(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        let mut database = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("database") {
                let value: LitStr = meta.value()?.parse()?;
                database = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `database = \"...\"`"))
            }
        })?;

        if let Some(d) = database {
            return Ok(d);
        }
    }

    // Default: snake_case struct name + "s"
    let name = input.ident.to_string();
    Ok(format!("{}s", to_snake_case(&name)))
}

/// Find the field marked `#[document(<marker>)]`, or else the field named
/// `<marker>`.
fn extract_field(input: &DeriveInput, marker: &str) -> syn::Result<Ident> {
    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => fields,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Document derive: only structs with named fields are supported",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Document derive: only structs are supported",
            ))
        }
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("document") {
                continue;
            }
            let mut marked = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(marker) {
                    marked = true;
                }
                Ok(())
            })?;
            if marked {
                if let Some(ident) = &field.ident {
                    return Ok(ident.clone());
                }
            }
        }
    }

    for field in &fields.named {
        if let Some(ident) = &field.ident {
            if ident == marker {
                return Ok(ident.clone());
            }
        }
    }

    Err(syn::Error::new_spanned(
        &input.ident,
        format!(
            "Document derive: no field marked with #[document({marker})] and no field named `{marker}`"
        ),
    ))
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
