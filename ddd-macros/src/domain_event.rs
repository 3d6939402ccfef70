use crate::utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, ItemEnum, LitInt, LitStr, Result, Variant, parse_macro_input, spanned::Spanned};

/// #[domain_event] 宏实现
/// - 支持单元、元组与具名字段变体，不注入任何字段
/// - 合并/追加派生：Debug, Clone, PartialEq, Serialize, Deserialize
/// - 生成 `::ddd_domain::domain_event::DomainEvent` 实现（event_type/event_version）
/// - 枚举级：`#[domain_event(version = N)]` 指定默认版本（默认 1）
/// - 变体可覆写：`#[event(event_type = "...", event_version = N)]`，默认类型名为 `Enum.Variant`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut default_version: Option<LitInt> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("version") {
            if default_version.is_some() {
                return Err(meta.error("duplicate key 'version' in attribute"));
            }
            default_version = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unknown key; expected 'version'"))
        }
    });
    parse_macro_input!(attr with parser);

    let item2: proc_macro2::TokenStream = item.into();
    let mut enum_item: ItemEnum = match syn::parse2(item2.clone()) {
        Ok(e) => e,
        Err(_) => {
            return syn::Error::new(item2.span(), "#[domain_event] can only be used on enum types")
                .to_compile_error()
                .into();
        }
    };

    match render(&mut enum_item, default_version) {
        Ok(ts) => ts.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn render(enum_item: &mut ItemEnum, default_version: Option<LitInt>) -> Result<proc_macro2::TokenStream> {
    apply_derives(
        &mut enum_item.attrs,
        vec![
            syn::parse_quote!(Debug),
            syn::parse_quote!(Clone),
            syn::parse_quote!(PartialEq),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
        ],
    );

    let enum_ident = enum_item.ident.clone();
    let default_version = default_version.unwrap_or_else(|| syn::parse_quote!(1));

    let mut type_arms = Vec::with_capacity(enum_item.variants.len());
    let mut version_arms = Vec::with_capacity(enum_item.variants.len());
    for variant in &mut enum_item.variants {
        let overrides = take_overrides(variant)?;
        let v_ident = &variant.ident;

        let event_type = overrides.event_type.unwrap_or_else(|| {
            LitStr::new(&format!("{enum_ident}.{v_ident}"), v_ident.span())
        });
        let event_version = overrides
            .event_version
            .unwrap_or_else(|| default_version.clone());

        // `{ .. }` 模式同时匹配单元、元组与具名字段变体
        type_arms.push(quote! { Self::#v_ident { .. } => #event_type });
        version_arms.push(quote! { Self::#v_ident { .. } => #event_version });
    }

    let (impl_generics, ty_generics, where_clause) = enum_item.generics.split_for_impl();
    Ok(quote! {
        #enum_item

        impl #impl_generics ::ddd_domain::domain_event::DomainEvent for #enum_ident #ty_generics #where_clause {
            fn event_type(&self) -> &str { match self { #( #type_arms, )* } }
            fn event_version(&self) -> usize { match self { #( #version_arms, )* } }
        }
    })
}

#[derive(Default)]
struct VariantOverrides {
    event_type: Option<LitStr>,
    event_version: Option<LitInt>,
}

/// 取出并移除变体上的 `#[event(...)]`，其余属性原样保留
fn take_overrides(variant: &mut Variant) -> Result<VariantOverrides> {
    let mut overrides = VariantOverrides::default();
    let (event_attrs, kept): (Vec<Attribute>, Vec<Attribute>) = variant
        .attrs
        .drain(..)
        .partition(|a| a.path().is_ident("event"));
    variant.attrs = kept;

    for attr in &event_attrs {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("event_type") {
                if overrides.event_type.is_some() {
                    return Err(meta.error("duplicate 'event_type' specified for this variant"));
                }
                overrides.event_type = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("event_version") {
                if overrides.event_version.is_some() {
                    return Err(meta.error("duplicate 'event_version' specified for this variant"));
                }
                overrides.event_version = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unknown key; expected 'event_type' | 'event_version'"))
            }
        })?;
    }
    Ok(overrides)
}
