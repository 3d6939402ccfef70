use quote::ToTokens;
use std::collections::HashSet;
use syn::{Attribute, Field, FieldsNamed, Path, Token, Type, punctuated::Punctuated};

/// 合并派生：`required` 在前，其后是用户已有的 derive，按 `derive_key` 去重；
/// 其余属性保持原有顺序
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<Path>) {
    let (derive_attrs, retained): (Vec<Attribute>, Vec<Attribute>) =
        attrs.drain(..).partition(|a| a.path().is_ident("derive"));

    // 无法解析的 derive 列表交由编译器报错，这里忽略
    let existing = derive_attrs.iter().flat_map(|a| {
        a.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)
            .map(|list| list.into_iter().collect::<Vec<_>>())
            .unwrap_or_default()
    });

    let mut seen = HashSet::new();
    let merged: Vec<Path> = required
        .into_iter()
        .chain(existing)
        .filter(|p| seen.insert(derive_key(p)))
        .collect();

    attrs.push(syn::parse_quote!(#[derive(#(#merged),*)]));
    attrs.extend(retained);
}

// 归一化 derive 的 key，避免 Serialize/serde::Serialize 重复
fn derive_key(p: &Path) -> String {
    match p.segments.last().map(|s| s.ident.to_string()) {
        Some(last) if last == "Serialize" || last == "Deserialize" => format!("serde::{last}"),
        Some(last) => last,
        None => p.to_token_stream().to_string(),
    }
}

/// 确保字段 `name` 位于结构体字段最前：已存在则移动原定义，缺失则以 `ty` 新建
pub(crate) fn ensure_leading_field(fields_named: &mut FieldsNamed, name: &str, ty: &Type) {
    let old_named = fields_named.named.clone();
    let mut new_named: Punctuated<Field, Token![,]> = Punctuated::new();

    match old_named.iter().find(|f| is_named(f, name)) {
        Some(existing) => new_named.push(existing.clone()),
        None => {
            let ident = syn::Ident::new(name, proc_macro2::Span::call_site());
            new_named.push(syn::parse_quote! { #ident: #ty });
        }
    }

    for f in old_named.into_iter().filter(|f| !is_named(f, name)) {
        new_named.push(f);
    }

    fields_named.named = new_named;
}

/// 字段缺失时追加到末尾，返回是否追加
pub(crate) fn append_field_if_missing(fields_named: &mut FieldsNamed, field: Field) -> bool {
    let Some(ident) = field.ident.as_ref() else {
        return false;
    };
    if fields_named
        .named
        .iter()
        .any(|f| f.ident.as_ref() == Some(ident))
    {
        return false;
    }
    fields_named.named.push(field);
    true
}

fn is_named(field: &Field, name: &str) -> bool {
    field.ident.as_ref().map(|i| i == name).unwrap_or(false)
}
