use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, GenericArgument, Ident, LitStr, PathArguments, Type};

pub fn derive_view(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

struct IndexField {
    ident: Ident,
    column: String,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let table = extract_table(input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "View derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "View derive only supports structs",
            ))
        }
    };

    let document = find_document_field(name, fields.iter())?;
    let document_ident = document.ident.clone().ok_or_else(|| {
        syn::Error::new_spanned(&document.ty, "document field must be named")
    })?;
    let payload = payload_type(&document.ty)?;

    let mut index_fields = Vec::new();
    for field in fields {
        if let Some(column) = index_column(field)? {
            if let Some(ident) = &field.ident {
                index_fields.push(IndexField {
                    ident: ident.clone(),
                    column,
                });
            }
        }
    }

    let index_inserts = index_fields.iter().map(|field| {
        let ident = &field.ident;
        let column = &field.column;
        quote! { index.insert_serialized(#column, &self.#ident); }
    });

    // Every field is rebuilt: the document from the row, index fields from
    // their columns, everything else from Default.
    let initializers = fields.iter().filter_map(|field| {
        let ident = field.ident.as_ref()?;
        if *ident == document_ident {
            return Some(quote! { #ident: document });
        }
        match index_fields.iter().find(|index| index.ident == *ident) {
            Some(index_field) => {
                let column = &index_field.column;
                Some(quote! {
                    #ident: index.decode(#column)?.unwrap_or_default()
                })
            }
            None => Some(quote! { #ident: ::core::default::Default::default() }),
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::view_cache::View for #name #ty_generics #where_clause {
            type Payload = #payload;

            const TABLE: &'static str = #table;

            fn document(&self) -> &::view_cache::Document<Self::Payload> {
                &self.#document_ident
            }

            fn document_mut(&mut self) -> &mut ::view_cache::Document<Self::Payload> {
                &mut self.#document_ident
            }

            fn index(&self) -> ::view_cache::IndexColumns {
                #[allow(unused_mut)]
                let mut index = ::view_cache::IndexColumns::new();
                #(#index_inserts)*
                index
            }

            fn from_row(
                document: ::view_cache::Document<Self::Payload>,
                index: &::view_cache::IndexColumns,
            ) -> ::core::result::Result<Self, ::view_cache::ViewError> {
                let _ = index;
                ::core::result::Result::Ok(Self {
                    #(#initializers,)*
                })
            }
        }
    })
}

fn extract_table(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("view") {
            continue;
        }

        let mut table = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                table = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `table = \"...\"`"))
            }
        })?;

        if let Some(t) = table {
            return Ok(t);
        }
    }

    // Default: snake_case struct name + "s"
    let name = input.ident.to_string();
    Ok(format!("{}s", to_snake_case(&name)))
}

fn find_document_field<'a>(
    name: &Ident,
    mut fields: impl Iterator<Item = &'a Field> + Clone,
) -> syn::Result<&'a Field> {
    for field in fields.clone() {
        for attr in &field.attrs {
            if !attr.path().is_ident("view") {
                continue;
            }
            let mut is_document = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("document") {
                    is_document = true;
                } else if meta.path.is_ident("index") {
                    if meta.input.peek(syn::Token![=]) {
                        let _: LitStr = meta.value()?.parse()?;
                    }
                } else {
                    return Err(meta.error("expected `document` or `index`"));
                }
                Ok(())
            })?;
            if is_document {
                return Ok(field);
            }
        }
    }

    // Default: look for a field named "document"
    fields
        .find(|field| field.ident.as_ref().is_some_and(|ident| ident == "document"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                name,
                "View derive: no field marked with #[view(document)] and no field named `document`",
            )
        })
}

fn index_column(field: &Field) -> syn::Result<Option<String>> {
    let mut column = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("view") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("index") {
                if meta.input.peek(syn::Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    column = Some(value.value());
                } else {
                    column = field.ident.as_ref().map(|ident| ident.to_string());
                }
            }
            Ok(())
        })?;
    }
    Ok(column)
}

/// The `T` in a `Document<T>` field type.
fn payload_type(ty: &Type) -> syn::Result<&Type> {
    if let Type::Path(path) = ty {
        if let Some(segment) = path.path.segments.last() {
            if segment.ident == "Document" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(payload)) = args.args.first() {
                        return Ok(payload);
                    }
                }
            }
        }
    }
    Err(syn::Error::new_spanned(
        ty,
        "document field must have type Document<Payload>",
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
