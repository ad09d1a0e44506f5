//! Procedural macros for the Meridian meta-object system.
//!
//! This crate provides `#[derive(Object)]`, the compile-time half of the
//! reflection engine: it discovers the reflectable members of a struct
//! without the author maintaining a registration list, allocates each member
//! a unique, declaration-ordered label, and emits the descriptor
//! constructors the runtime assembles into the type's meta-object on first
//! use.
//!
//! # Members
//!
//! Fields of type `Property<T>` are reflectable members. By default a member
//! is read-only; the `#[property]` attribute adds capabilities:
//!
//! ```ignore
//! #[derive(Object)]
//! struct Lamp {
//!     base: ObjectBase,
//!
//!     #[property]
//!     model: Property<String>,
//!
//!     #[property(notify)]
//!     lit: Property<bool>,
//!
//!     #[property(write, reset, default = 50)]
//!     brightness: Property<i32>,
//! }
//! ```
//!
//! Property attributes:
//! - `write`: accept generic writes (implies change notification)
//! - `reset`: restorable to its declared default (implies change notification)
//! - `notify`: raise a change event when the value actually changes
//! - `default = <expr>`: the declared default `reset` restores
//!   (`Default::default()` when omitted)
//! - `label = <int>`: explicit label; later members continue counting from it
//! - `skip`: exclude the field from reflection
//!
//! # Struct attributes
//!
//! ```ignore
//! #[derive(Object)]
//! #[object(no_factory)]
//! #[object(class_info("URL", "https://example.org/"))]
//! #[object(implements(Describe))]
//! struct Lamp { /* ... */ }
//! ```
//!
//! - `no_factory`: don't register a `Default`-based instance factory
//! - `class_info("name", "value")`: attach a metadata pair (repeatable)
//! - `implements(Trait, ...)`: register interface-cast thunks (repeatable)
//!
//! # Generated API
//!
//! For a struct `Lamp` the derive generates `Lamp::static_meta()`,
//! `Lamp::register_type()`, the `Object` trait implementation, and per
//! member: `set_<field>` (writable), `reset_<field>` (resettable), and
//! `<field>_changed()` returning the member's change-signal façade
//! (notifying).

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DeriveInput, Expr, Field, Fields, Ident, LitInt, LitStr, Path, Type,
    parse_macro_input,
};

/// Derive the `Object` trait and generate meta-object information.
///
/// This macro generates:
/// - A lazily built static `MetaObject` describing the type's members
/// - Type-erased read/write/reset accessors and offset resolvers
/// - Typed setters, resetters, and change-signal constructors
/// - Implementation of the `Object` trait
///
/// See the crate documentation for the attribute reference.
#[proc_macro_derive(Object, attributes(object, property))]
pub fn derive_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_derive_object(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parsed property information.
struct PropertyInfo {
    field_name: Ident,
    value_type: Type,
    label: u32,
    write: bool,
    reset: bool,
    notify: bool,
    default: Option<Expr>,
}

impl PropertyInfo {
    /// Whether this member raises a change event (directly requested or
    /// implied by write/reset; mirrors the runtime canonicalization).
    fn is_notifying(&self) -> bool {
        self.notify || self.write || self.reset
    }
}

/// Parsed struct-level object attributes.
struct ObjectAttrs {
    no_factory: bool,
    class_infos: Vec<(String, String)>,
    interfaces: Vec<Path>,
}

/// Allocates declaration-ordered labels, honouring explicit overrides.
struct LabelAllocator {
    current: u32,
}

impl LabelAllocator {
    fn new() -> Self {
        Self { current: 0 }
    }

    /// Next implicit label.
    fn next(&mut self) -> u32 {
        self.current += 1;
        self.current
    }

    /// Jump to an explicit label; later implicit labels continue from it.
    ///
    /// No uniqueness check happens here: a colliding or backwards explicit
    /// label is surfaced when the member table validates its ordering.
    fn jump(&mut self, label: u32) -> u32 {
        self.current = label;
        self.current
    }
}

fn impl_derive_object(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    // Parse struct-level attributes
    let object_attrs = parse_object_attrs(&input.attrs)?;

    // Get struct fields
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Object derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Object derive only supports structs",
            ));
        }
    };

    // Find ObjectBase field
    let has_base = fields
        .iter()
        .any(|f| f.ident.as_ref().is_some_and(|i| i == "base"));

    if !has_base {
        return Err(syn::Error::new_spanned(
            input,
            "Object derive requires a `base: ObjectBase` field",
        ));
    }

    // Discover members and allocate labels in declaration order.
    let mut labels = LabelAllocator::new();
    let mut properties = Vec::new();

    for field in fields.iter() {
        if let Some(property) = parse_property_field(field, &mut labels)? {
            properties.push(property);
        }
    }

    let accessor_fns = generate_accessor_fns(struct_name, &properties);
    let caster_statics = generate_caster_statics(struct_name, &object_attrs.interfaces);
    let member_registrations =
        generate_member_registrations(struct_name, &properties, &object_attrs, &mut labels);
    let typed_members = generate_typed_members(struct_name, &properties);

    let factory = if object_attrs.no_factory {
        quote! {}
    } else {
        quote! {
            .factory(|| Box::new(<#struct_name as Default>::default()) as Box<dyn meridian_core::Object>)
        }
    };

    let type_name_str = struct_name.to_string();

    let expanded = quote! {
        #accessor_fns

        #caster_statics

        impl #struct_name {
            /// The static meta-object for this type.
            ///
            /// Built on first access and cached; all later calls (from any
            /// thread) return the same descriptor.
            pub fn static_meta() -> &'static meridian_core::MetaObject {
                static META: std::sync::OnceLock<meridian_core::MetaObject> =
                    std::sync::OnceLock::new();
                META.get_or_init(|| {
                    meridian_core::MetaObjectBuilder::new::<#struct_name>(#type_name_str)
                        #factory
                        #member_registrations
                        .build()
                })
            }

            /// Register this type in the global `TypeRegistry`.
            ///
            /// Call during application initialization to enable lookup and
            /// dynamic creation by type name.
            #[allow(dead_code)]
            pub fn register_type() {
                meridian_core::TypeRegistry::register(Self::static_meta());
            }

            #typed_members
        }

        impl meridian_core::Object for #struct_name {
            fn object_id(&self) -> meridian_core::ObjectId {
                self.base.id()
            }

            fn meta_object(&self) -> Option<&'static meridian_core::MetaObject> {
                Some(Self::static_meta())
            }

            fn change_hub(&self) -> Option<&meridian_core::ChangeHub> {
                Some(self.base.hub())
            }
        }
    };

    Ok(expanded)
}

/// Parse struct-level #[object(...)] attributes.
fn parse_object_attrs(attrs: &[Attribute]) -> syn::Result<ObjectAttrs> {
    let mut result = ObjectAttrs {
        no_factory: false,
        class_infos: Vec::new(),
        interfaces: Vec::new(),
    };

    for attr in attrs {
        if !attr.path().is_ident("object") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("no_factory") {
                result.no_factory = true;
            } else if meta.path.is_ident("class_info") {
                let content;
                syn::parenthesized!(content in meta.input);
                let name: LitStr = content.parse()?;
                content.parse::<syn::Token![,]>()?;
                let value: LitStr = content.parse()?;
                result.class_infos.push((name.value(), value.value()));
            } else if meta.path.is_ident("implements") {
                let content;
                syn::parenthesized!(content in meta.input);
                let traits =
                    content.parse_terminated(Path::parse_mod_style, syn::Token![,])?;
                result.interfaces.extend(traits);
            } else {
                return Err(meta.error("unknown object attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// Parse one field into a property member, if it is one.
fn parse_property_field(
    field: &Field,
    labels: &mut LabelAllocator,
) -> syn::Result<Option<PropertyInfo>> {
    let field_name = match &field.ident {
        Some(name) => name.clone(),
        None => return Ok(None),
    };

    if field_name == "base" {
        return Ok(None);
    }

    let value_type = extract_property_value_type(&field.ty);

    let mut write = false;
    let mut reset = false;
    let mut notify = false;
    let mut skip = false;
    let mut explicit_label = None;
    let mut default = None;
    let mut has_property_attr = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("property") {
            continue;
        }
        has_property_attr = true;

        // Handle both #[property] and #[property(...)]
        if matches!(attr.meta, syn::Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("write") {
                write = true;
            } else if meta.path.is_ident("reset") {
                reset = true;
            } else if meta.path.is_ident("notify") {
                notify = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else if meta.path.is_ident("label") {
                let value: LitInt = meta.value()?.parse()?;
                explicit_label = Some(value.base10_parse::<u32>()?);
            } else if meta.path.is_ident("default") {
                let value: Expr = meta.value()?.parse()?;
                default = Some(value);
            } else {
                return Err(meta.error("unknown property attribute"));
            }
            Ok(())
        })?;
    }

    let Some(value_type) = value_type else {
        if has_property_attr {
            return Err(syn::Error::new_spanned(
                field,
                "#[property] requires a Property<T> field",
            ));
        }
        // A plain field; not part of the reflection surface.
        return Ok(None);
    };

    if skip {
        return Ok(None);
    }

    let label = match explicit_label {
        Some(label) => labels.jump(label),
        None => labels.next(),
    };

    Ok(Some(PropertyInfo {
        field_name,
        value_type,
        label,
        write,
        reset,
        notify,
        default,
    }))
}

/// Extract `T` from a `Property<T>` field type.
fn extract_property_value_type(ty: &Type) -> Option<Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Property" {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner.clone());
                    }
                }
            }
        }
    }
    None
}

/// Convert a type to a string representation.
fn type_to_string(ty: &Type) -> String {
    quote!(#ty).to_string().replace(' ', "")
}

/// Generate the type-erased accessor functions for each member.
fn generate_accessor_fns(struct_name: &Ident, properties: &[PropertyInfo]) -> TokenStream2 {
    let struct_lower = struct_name.to_string().to_lowercase();
    let struct_name_str = struct_name.to_string();

    let fns: Vec<TokenStream2> = properties
        .iter()
        .map(|property| {
            let field_name = &property.field_name;
            let value_type = &property.value_type;
            let type_name_str = type_to_string(value_type);

            let read_name = format_ident!("__{}_{}_read", struct_lower, field_name);
            let offset_name = format_ident!("__{}_{}_offset", struct_lower, field_name);

            let mut tokens = quote! {
                #[allow(non_snake_case)]
                fn #read_name(
                    object: &dyn meridian_core::Object,
                ) -> meridian_core::MetaResult<Box<dyn std::any::Any + Send>> {
                    let typed = meridian_core::object_cast::<#struct_name>(object)
                        .ok_or(meridian_core::MetaError::ObjectTypeMismatch {
                            expected: #struct_name_str,
                        })?;
                    Ok(Box::new(typed.#field_name.get()))
                }

                #[allow(non_snake_case)]
                fn #offset_name() -> usize {
                    std::mem::offset_of!(#struct_name, #field_name)
                }
            };

            if property.write {
                let write_name = format_ident!("__{}_{}_write", struct_lower, field_name);
                let setter_name = format_ident!("set_{}", field_name);
                tokens.extend(quote! {
                    #[allow(non_snake_case)]
                    fn #write_name(
                        object: &dyn meridian_core::Object,
                        value: Box<dyn std::any::Any + Send>,
                    ) -> meridian_core::MetaResult<()> {
                        let typed = meridian_core::object_cast::<#struct_name>(object)
                            .ok_or(meridian_core::MetaError::ObjectTypeMismatch {
                                expected: #struct_name_str,
                            })?;
                        let value = value.downcast::<#value_type>().map_err(|_| {
                            meridian_core::MetaError::PropertyTypeMismatch {
                                expected: #type_name_str,
                                got: "unknown",
                            }
                        })?;
                        typed.#setter_name(*value);
                        Ok(())
                    }
                });
            }

            if property.reset {
                let reset_name = format_ident!("__{}_{}_reset", struct_lower, field_name);
                let resetter_name = format_ident!("reset_{}", field_name);
                tokens.extend(quote! {
                    #[allow(non_snake_case)]
                    fn #reset_name(
                        object: &dyn meridian_core::Object,
                    ) -> meridian_core::MetaResult<()> {
                        let typed = meridian_core::object_cast::<#struct_name>(object)
                            .ok_or(meridian_core::MetaError::ObjectTypeMismatch {
                                expected: #struct_name_str,
                            })?;
                        typed.#resetter_name();
                        Ok(())
                    }
                });
            }

            tokens
        })
        .collect();

    quote! { #(#fns)* }
}

/// Generate one interface-caster static per registered interface.
fn generate_caster_statics(struct_name: &Ident, interfaces: &[Path]) -> TokenStream2 {
    let statics: Vec<TokenStream2> = interfaces
        .iter()
        .map(|interface| {
            let caster_name = caster_static_name(struct_name, interface);
            quote! {
                #[allow(non_upper_case_globals)]
                static #caster_name: meridian_core::InterfaceCaster<dyn #interface> =
                    |object| {
                        meridian_core::object_cast::<#struct_name>(object)
                            .map(|typed| typed as &dyn #interface)
                    };
            }
        })
        .collect();

    quote! { #(#statics)* }
}

fn caster_static_name(struct_name: &Ident, interface: &Path) -> Ident {
    let interface_name = interface
        .segments
        .last()
        .map(|segment| segment.ident.to_string())
        .unwrap_or_default();
    format_ident!(
        "__{}_{}_CASTER",
        struct_name.to_string().to_uppercase(),
        interface_name.to_uppercase()
    )
}

/// Generate the builder chain registering every member, in declaration
/// order; struct-level entries (class-info, interfaces) are labelled after
/// the fields.
fn generate_member_registrations(
    struct_name: &Ident,
    properties: &[PropertyInfo],
    object_attrs: &ObjectAttrs,
    labels: &mut LabelAllocator,
) -> TokenStream2 {
    let struct_lower = struct_name.to_string().to_lowercase();
    let mut registrations = TokenStream2::new();

    for property in properties {
        let field_name = &property.field_name;
        let field_name_str = field_name.to_string();
        let value_type = &property.value_type;
        let type_name_str = type_to_string(value_type);
        let label = property.label;

        let read_name = format_ident!("__{}_{}_read", struct_lower, field_name);
        let offset_name = format_ident!("__{}_{}_offset", struct_lower, field_name);

        let mut features = quote! { meridian_core::FeatureSet::of(meridian_core::Feature::Read) };
        if property.write {
            features.extend(quote! { .with(meridian_core::Feature::Write) });
        }
        if property.reset {
            features.extend(quote! { .with(meridian_core::Feature::Reset) });
        }
        if property.notify {
            features.extend(quote! { .with(meridian_core::Feature::Notify) });
        }

        let write = if property.write {
            let write_name = format_ident!("__{}_{}_write", struct_lower, field_name);
            quote! { Some(#write_name) }
        } else {
            quote! { None }
        };

        let reset = if property.reset {
            let reset_name = format_ident!("__{}_{}_reset", struct_lower, field_name);
            quote! { Some(#reset_name) }
        } else {
            quote! { None }
        };

        let (notify_signal, token) = if property.is_notifying() {
            let signal_name = format!("{field_name}_changed");
            (
                quote! { Some(#signal_name) },
                quote! {
                    Some(meridian_core::SignalToken::new::<#struct_name>(
                        meridian_core::Label(#label),
                    ))
                },
            )
        } else {
            (quote! { None }, quote! { None })
        };

        registrations.extend(quote! {
            .member(meridian_core::MemberInfo {
                kind: meridian_core::MemberKind::Property,
                label: meridian_core::Label(#label),
                name: #field_name_str,
                type_name: #type_name_str,
                type_id: Some(std::any::TypeId::of::<#value_type>()),
                features: #features,
                notify_signal: #notify_signal,
                offset: Some(#offset_name),
                read: Some(#read_name),
                write: #write,
                reset: #reset,
                token: #token,
                ..meridian_core::MemberInfo::invalid()
            })
        });
    }

    for (name, value) in &object_attrs.class_infos {
        let label = labels.next();
        registrations.extend(quote! {
            .class_info(meridian_core::Label(#label), #name, #value)
        });
    }

    for interface in &object_attrs.interfaces {
        let label = labels.next();
        let name = interface
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .unwrap_or_default();
        let caster_name = caster_static_name(struct_name, interface);
        registrations.extend(quote! {
            .interface(meridian_core::Label(#label), #name, &#caster_name)
        });
    }

    registrations
}

/// Generate the typed member API: private change-applying helpers, public
/// setters and resetters, and change-signal constructors.
fn generate_typed_members(struct_name: &Ident, properties: &[PropertyInfo]) -> TokenStream2 {
    let members: Vec<TokenStream2> = properties
        .iter()
        .map(|property| {
            let field_name = &property.field_name;
            let value_type = &property.value_type;
            let label = property.label;
            let mut tokens = TokenStream2::new();

            if property.is_notifying() {
                let update_name = format_ident!("update_{}", field_name);
                let changed_name = format_ident!("{}_changed", field_name);
                let changed_doc = format!(
                    "The change signal of the `{field_name}` member; raised after each \
                     actual value change."
                );

                tokens.extend(quote! {
                    #[allow(dead_code)]
                    fn #update_name(&self, value: #value_type) {
                        if self.#field_name.set(value.clone()) {
                            meridian_core::emit_change(
                                self,
                                meridian_core::Label(#label),
                                &value,
                            );
                        }
                    }

                    #[doc = #changed_doc]
                    #[allow(dead_code)]
                    pub fn #changed_name() -> meridian_core::ChangeSignal {
                        meridian_core::ChangeSignal::new(
                            meridian_core::Label(#label),
                            Self::static_meta,
                        )
                    }
                });
            }

            if property.write {
                let update_name = format_ident!("update_{}", field_name);
                let setter_name = format_ident!("set_{}", field_name);
                let setter_doc = format!(
                    "Set the `{field_name}` member, raising its change signal if the \
                     value actually changed."
                );
                tokens.extend(quote! {
                    #[doc = #setter_doc]
                    #[allow(dead_code)]
                    pub fn #setter_name(&self, value: #value_type) {
                        self.#update_name(value);
                    }
                });
            }

            if property.reset {
                let update_name = format_ident!("update_{}", field_name);
                let resetter_name = format_ident!("reset_{}", field_name);
                let default = match &property.default {
                    Some(expr) => quote! { #expr },
                    None => quote! { <#value_type as Default>::default() },
                };
                let resetter_doc =
                    format!("Restore the `{field_name}` member to its declared default.");
                tokens.extend(quote! {
                    #[doc = #resetter_doc]
                    #[allow(dead_code)]
                    pub fn #resetter_name(&self) {
                        self.#update_name(#default);
                    }
                });
            }

            tokens
        })
        .collect();

    quote! { #(#members)* }
}
