use crate::utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::{Fields, ItemStruct, Type, parse_macro_input, spanned::Spanned};

/// #[entity_id] 宏实现
/// 仅支持单字段 tuple struct，并为包装类型：
/// - 合并/追加派生：Default, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash
/// - 实现 `::ddd_domain::entity::Identity`（委托内部类型生成标识、判断默认值）
/// - 提供 new(value)、Display、FromStr、AsRef 以及与内部类型的双向 From
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(proc_macro2::Span::call_site(), "#[entity_id] takes no arguments")
            .to_compile_error()
            .into();
    }
    let mut st = parse_macro_input!(item as ItemStruct);

    let inner_ty = match single_field(&st) {
        Ok(ty) => ty.clone(),
        Err(err) => return err.to_compile_error().into(),
    };

    apply_derives(
        &mut st.attrs,
        vec![
            syn::parse_quote!(Default),
            syn::parse_quote!(Clone),
            syn::parse_quote!(Debug),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
            syn::parse_quote!(PartialEq),
            syn::parse_quote!(Eq),
            syn::parse_quote!(Hash),
        ],
    );

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();
    let this = quote!(#ident #ty_generics);
    let identity = quote!(::ddd_domain::entity::Identity);

    quote! {
        #st

        impl #impl_generics #this #where_clause {
            pub fn new(value: #inner_ty) -> Self { Self(value) }
        }

        impl #impl_generics ::std::str::FromStr for #this #where_clause {
            type Err = <#inner_ty as ::std::str::FromStr>::Err;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                s.parse::<#inner_ty>().map(Self)
            }
        }

        impl #impl_generics ::std::fmt::Display for #this #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl #impl_generics ::core::convert::AsRef<#inner_ty> for #this #where_clause {
            fn as_ref(&self) -> &#inner_ty { &self.0 }
        }

        impl #impl_generics ::core::convert::From<#this> for #inner_ty #where_clause {
            fn from(value: #this) -> Self { value.0 }
        }

        impl #impl_generics ::core::convert::From<#inner_ty> for #this #where_clause {
            fn from(value: #inner_ty) -> Self { Self(value) }
        }

        impl #impl_generics #identity for #this #where_clause {
            fn generate(sequence: u64) -> ::ddd_domain::error::DomainResult<Self> {
                <#inner_ty as #identity>::generate(sequence).map(Self)
            }

            fn is_default(&self) -> bool {
                <#inner_ty as #identity>::is_default(&self.0)
            }
        }
    }
    .into()
}

fn single_field(st: &ItemStruct) -> syn::Result<&Type> {
    let Fields::Unnamed(fields) = &st.fields else {
        return Err(syn::Error::new(
            st.span(),
            "#[entity_id] supports only tuple structs, e.g. `struct OrderId(Uuid);`",
        ));
    };
    match fields.unnamed.first() {
        Some(field) if fields.unnamed.len() == 1 => Ok(&field.ty),
        _ => Err(syn::Error::new(
            fields.span(),
            "#[entity_id] requires a tuple struct with exactly one field",
        )),
    }
}
