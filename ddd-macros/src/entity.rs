use crate::utils::{append_field_if_missing, apply_derives, ensure_leading_field};
use proc_macro::TokenStream;
use quote::quote;
use syn::{Fields, ItemStruct, LitBool, Type, parse_macro_input, spanned::Spanned};

#[derive(Default)]
struct EntityArgs {
    id: Option<Type>,
    event: Option<Type>,
    debug: Option<bool>,
}

/// #[entity] 宏实现
/// - 确保 `id: IdType` 位于字段最前（已存在则复用原定义）
/// - 缺失时在末尾追加 `#[serde(skip)] domain_events: DomainEvents<EventType>`
/// - 自动实现 `::ddd_domain::entity::Entity`（id/set_id/domain_events/domain_events_mut）
/// - 支持参数：`#[entity(id = IdType, event = EventType, debug = true|false)]`；
///   - `id` 默认 `String`
///   - `event` 默认 `::ddd_domain::domain_event::Notification`
///   - `debug` 默认 `true`（派生 Debug）。当为 `false` 时不派生 Debug，便于用户自定义实现。
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = EntityArgs::default();
    let parser = syn::meta::parser(|meta| {
        let slot = if meta.path.is_ident("id") {
            &mut args.id
        } else if meta.path.is_ident("event") {
            &mut args.event
        } else if meta.path.is_ident("debug") {
            if args.debug.is_some() {
                return Err(meta.error("duplicate key 'debug' in attribute"));
            }
            let flag: LitBool = meta.value()?.parse()?;
            args.debug = Some(flag.value());
            return Ok(());
        } else {
            return Err(meta.error("unknown key in attribute; expected 'id', 'event' or 'debug'"));
        };
        if slot.is_some() {
            return Err(meta.error("duplicate key in attribute"));
        }
        *slot = Some(meta.value()?.parse()?);
        Ok(())
    });
    parse_macro_input!(attr with parser);

    let mut st = parse_macro_input!(item as ItemStruct);
    let span = st.span();
    let Fields::Named(fields) = &mut st.fields else {
        return syn::Error::new(span, "#[entity] only supports named-field structs")
            .to_compile_error()
            .into();
    };

    let id_type = args.id.unwrap_or_else(|| syn::parse_quote!(String));
    let event_type = args
        .event
        .unwrap_or_else(|| syn::parse_quote!(::ddd_domain::domain_event::Notification));

    ensure_leading_field(fields, "id", &id_type);
    append_field_if_missing(
        fields,
        syn::parse_quote! {
            #[serde(skip)]
            domain_events: ::ddd_domain::entity::DomainEvents<#event_type>
        },
    );

    let mut derives: Vec<syn::Path> = Vec::with_capacity(4);
    if args.debug.unwrap_or(true) {
        derives.push(syn::parse_quote!(Debug));
    }
    derives.extend([
        syn::parse_quote!(Default),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ]);
    apply_derives(&mut st.attrs, derives);

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    quote! {
        #st

        impl #impl_generics ::ddd_domain::entity::Entity for #ident #ty_generics #where_clause {
            type Id = #id_type;
            type Event = #event_type;

            fn id(&self) -> &Self::Id { &self.id }

            fn set_id(&mut self, id: Self::Id) { self.id = id; }

            fn domain_events(&self) -> &::ddd_domain::entity::DomainEvents<Self::Event> {
                &self.domain_events
            }

            fn domain_events_mut(&mut self) -> &mut ::ddd_domain::entity::DomainEvents<Self::Event> {
                &mut self.domain_events
            }
        }
    }
    .into()
}
