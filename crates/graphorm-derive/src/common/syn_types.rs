//! Type shape helpers.

/// The single generic argument of `ty` when its last path segment is `wrapper`.
fn wrapped<'a>(ty: &'a syn::Type, wrapper: &str) -> Option<&'a syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let seg = type_path.path.segments.last()?;
    if seg.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}

/// `T` from `Option<T>`, `std::option::Option<T>` or `core::option::Option<T>`.
pub fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    wrapped(ty, "Option")
}

pub fn vec_inner(ty: &syn::Type) -> Option<&syn::Type> {
    wrapped(ty, "Vec")
}

pub fn box_inner(ty: &syn::Type) -> Option<&syn::Type> {
    wrapped(ty, "Box")
}

/// Shape of a nested record slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedSlot {
    /// `Option<C>`
    Plain,
    /// `Option<Box<C>>`
    Boxed,
}

pub fn nested_slot(ty: &syn::Type) -> Option<NestedSlot> {
    let inner = option_inner(ty)?;
    Some(match box_inner(inner) {
        Some(_) => NestedSlot::Boxed,
        None => NestedSlot::Plain,
    })
}

/// Whether a last-change field is `Option<_>` or a bare timestamp.
pub fn is_optional(ty: &syn::Type) -> bool {
    option_inner(ty).is_some()
}
