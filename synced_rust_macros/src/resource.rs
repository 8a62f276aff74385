use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr};

pub fn derive_resource(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    // Extract #[resource(type_name = "...")] from struct-level attributes
    let type_name = extract_type_name(&input);

    // Fields marked #[resource(key)], or the field named "id"
    let key_fields = extract_key_fields(&input);

    let inserts = key_fields.iter().map(|field| {
        let key = field.to_string();
        quote! {
            identity.set(#key, &self.#field);
        }
    });

    let expanded = quote! {
        impl synced_rust::Resource for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn identity(&self) -> synced_rust::Identity {
                let mut identity = synced_rust::Identity::new();
                #(#inserts)*
                identity
            }
        }
    };

    TokenStream::from(expanded)
}

fn extract_type_name(input: &DeriveInput) -> String {
    for attr in &input.attrs {
        if !attr.path().is_ident("resource") {
            continue;
        }

        let mut type_name = None;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_name") {
                let value: LitStr = meta.value()?.parse()?;
                type_name = Some(value.value());
            }
            Ok(())
        });

        if let Some(t) = type_name {
            return t;
        }
    }

    // Default: snake_case struct name + "s"
    let name = input.ident.to_string();
    format!("{}s", to_snake_case(&name))
}

fn extract_key_fields(input: &DeriveInput) -> Vec<syn::Ident> {
    let mut keys = Vec::new();

    if let Data::Struct(data_struct) = &input.data {
        if let Fields::Named(fields) = &data_struct.fields {
            for field in &fields.named {
                for attr in &field.attrs {
                    if attr.path().is_ident("resource") {
                        let mut is_key = false;
                        let _ = attr.parse_nested_meta(|meta| {
                            if meta.path.is_ident("key") {
                                is_key = true;
                            }
                            Ok(())
                        });
                        if is_key {
                            keys.push(field.ident.clone().unwrap());
                        }
                    }
                }
            }

            if !keys.is_empty() {
                return keys;
            }

            // Default: look for a field named "id"
            for field in &fields.named {
                if let Some(ident) = &field.ident {
                    if ident == "id" {
                        return vec![ident.clone()];
                    }
                }
            }
        }
    }

    panic!("Resource derive: no field marked with #[resource(key)] and no field named `id`");
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_lowercase().next().unwrap());
        } else {
            result.push(ch);
        }
    }
    result
}
