//! Derive macro for reflected type descriptions.
//!
//! This crate provides `#[derive(Reflect)]`, which describes a struct's
//! members to `oxide-model` so conventions can discover properties, keys and
//! relationships from it.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Lit, Meta, PathArguments, Type,
    parse_macro_input,
};

/// Derives `oxide_model::reflect::Reflect` for a struct with named fields.
///
/// Member names are the `PascalCase` form of the field names, so `blog_id`
/// becomes `BlogId`. `Option<T>` fields are nullable; `Vec<T>`, `HashSet<T>`,
/// `BTreeSet<T>` and `VecDeque<T>` are collections; `Box`, `Rc` and `Arc` are
/// looked through. Any other non-scalar type is a reference and must itself
/// implement `Reflect`.
///
/// # Field Attributes
///
/// - `#[reflect(not_mapped)]` - Keeps the member visible but excluded from
///   mapping
/// - `#[reflect(ignore)]` - Leaves the field out of the description entirely
/// - `#[reflect(read_only)]` - The member cannot be written
/// - `#[reflect(name = "Member")]` - Overrides the member name
/// - `#[reflect(base)]` - The field embeds the base type; its members are
///   inherited instead of becoming a navigation
#[proc_macro_derive(Reflect, attributes(reflect))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_reflect_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_reflect_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let type_name = struct_name.to_string();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Reflect derive does not support generic structs",
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Reflect derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Reflect derive only supports structs",
            ));
        }
    };

    let mut base: Option<(String, Type)> = None;
    let mut members = Vec::new();
    let mut reached = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_reflect_attrs(&field.attrs)?;
        if attrs.ignore {
            continue;
        }
        if attrs.base {
            if base.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only one field can be marked #[reflect(base)]",
                ));
            }
            let Some(name) = type_ident(&field.ty) else {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "#[reflect(base)] requires a named type",
                ));
            };
            base = Some((name, field.ty.clone()));
            continue;
        }

        let member_name = attrs
            .name
            .unwrap_or_else(|| to_pascal_case(&field_name.to_string()));
        let shape = classify(&field.ty);
        let constructor = match &shape.kind {
            Kind::Primitive(primitive) => {
                let primitive = syn::Ident::new(primitive, proc_macro2::Span::call_site());
                quote! {
                    ::oxide_model::reflect::MemberInfo::primitive(
                        #member_name,
                        ::oxide_model::reflect::PrimitiveType::#primitive,
                    )
                }
            }
            Kind::Reference(target, ty) => {
                reached.push(ty.clone());
                quote! { ::oxide_model::reflect::MemberInfo::reference(#member_name, #target) }
            }
            Kind::Collection(target, ty) => {
                reached.push(ty.clone());
                quote! { ::oxide_model::reflect::MemberInfo::collection(#member_name, #target) }
            }
        };
        let nullable = shape.nullable.then(|| quote! { .nullable() });
        let read_only = attrs.read_only.then(|| quote! { .read_only() });
        let not_mapped = attrs.not_mapped.then(|| quote! { .not_mapped() });
        members.push(quote! {
            .member(#constructor #nullable #read_only #not_mapped)
        });
    }

    let with_base = base
        .as_ref()
        .map(|(name, _)| quote! { .with_base(#name) });
    let register_base = base.as_ref().map(|(_, ty)| {
        quote! { <#ty as ::oxide_model::reflect::Reflect>::register(registry); }
    });

    Ok(quote! {
        impl ::oxide_model::reflect::Reflect for #struct_name {
            fn type_info() -> ::oxide_model::reflect::TypeInfo {
                ::oxide_model::reflect::TypeInfo::new(#type_name)
                    #with_base
                    #(#members)*
            }

            fn register(registry: &mut ::oxide_model::reflect::TypeRegistry) {
                if !registry.insert(<Self as ::oxide_model::reflect::Reflect>::type_info()) {
                    return;
                }
                #register_base
                #(<#reached as ::oxide_model::reflect::Reflect>::register(registry);)*
            }
        }
    })
}

#[derive(Default)]
struct ReflectAttrs {
    name: Option<String>,
    not_mapped: bool,
    ignore: bool,
    read_only: bool,
    base: bool,
}

fn parse_reflect_attrs(attrs: &[Attribute]) -> syn::Result<ReflectAttrs> {
    let mut result = ReflectAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("reflect") || matches!(attr.meta, Meta::Path(_)) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("not_mapped") {
                result.not_mapped = true;
            } else if meta.path.is_ident("ignore") {
                result.ignore = true;
            } else if meta.path.is_ident("read_only") {
                result.read_only = true;
            } else if meta.path.is_ident("base") {
                result.base = true;
            } else if meta.path.is_ident("name") {
                let value: Expr = meta.value()?.parse()?;
                if let Expr::Lit(lit) = value {
                    if let Lit::Str(s) = lit.lit {
                        result.name = Some(s.value());
                    }
                }
            } else {
                return Err(meta.error("unknown reflect attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

enum Kind {
    Primitive(&'static str),
    Reference(String, Type),
    Collection(String, Type),
}

struct Shape {
    kind: Kind,
    nullable: bool,
}

fn classify(ty: &Type) -> Shape {
    if let Some(inner) = generic_argument(ty, &["Option"]) {
        let mut shape = classify(inner);
        shape.nullable = true;
        return shape;
    }
    if let Some(inner) = generic_argument(ty, &["Box", "Rc", "Arc"]) {
        return classify(inner);
    }
    if let Some(inner) = generic_argument(ty, &["Vec"]) {
        if type_ident(inner).as_deref() == Some("u8") {
            return Shape {
                kind: Kind::Primitive("Bytes"),
                nullable: false,
            };
        }
    }
    if let Some(inner) = generic_argument(ty, &["Vec", "HashSet", "BTreeSet", "VecDeque"]) {
        let element = generic_argument(inner, &["Box", "Rc", "Arc"]).unwrap_or(inner);
        let target = type_ident(element).unwrap_or_default();
        return Shape {
            kind: Kind::Collection(target, element.clone()),
            nullable: false,
        };
    }

    let ident = type_ident(ty).unwrap_or_default();
    let kind = primitive_for(&ident).map_or_else(|| Kind::Reference(ident, ty.clone()), Kind::Primitive);
    Shape {
        kind,
        nullable: false,
    }
}

fn primitive_for(ident: &str) -> Option<&'static str> {
    let primitive = match ident {
        "bool" => "Bool",
        "i8" | "u8" | "i16" => "Int16",
        "u16" | "i32" => "Int32",
        "u32" | "i64" | "u64" | "isize" | "usize" => "Int64",
        "f32" => "Float32",
        "f64" => "Float64",
        "Decimal" | "BigDecimal" => "Decimal",
        "String" | "str" | "char" => "String",
        "Uuid" => "Guid",
        "DateTime" | "NaiveDateTime" | "SystemTime" | "OffsetDateTime" | "PrimitiveDateTime" => {
            "DateTime"
        }
        "NaiveDate" | "Date" => "Date",
        "NaiveTime" | "Time" => "Time",
        _ => return None,
    };
    Some(primitive)
}

/// The last path segment of a type, looking through references.
fn type_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        Type::Reference(reference) => type_ident(&reference.elem),
        _ => None,
    }
}

/// The single generic argument of `ty` when its outer type is one of
/// `wrappers`.
fn generic_argument<'a>(ty: &'a Type, wrappers: &[&str]) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if !wrappers.iter().any(|w| segment.ident == *w) {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

fn to_pascal_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}
