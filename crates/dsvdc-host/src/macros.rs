//! Small helper macros for entity construction.

/// Generates chainable `with_<field>` setters.
macro_rules! with {
    ($field:ident, Option<$inner:ty>) => {
        paste::paste! {
            pub fn [<with_ $field>](mut self, $field: $inner) -> Self {
                self.$field = Some($field);
                self
            }
        }
    };
    ($field:ident, $ty:ty) => {
        paste::paste! {
            pub fn [<with_ $field>](mut self, $field: $ty) -> Self {
                self.$field = $field;
                self
            }
        }
    };
}

/// Same as [`with!`] but for fields living in an embedded
/// [`crate::common::CommonProps`].
macro_rules! with_common {
    ($field:ident, Option<$inner:ty>) => {
        paste::paste! {
            pub fn [<with_ $field>](mut self, $field: $inner) -> Self {
                self.common.$field = Some($field);
                self
            }
        }
    };
    ($field:ident, $ty:ty) => {
        paste::paste! {
            pub fn [<with_ $field>](mut self, $field: $ty) -> Self {
                self.common.$field = $field;
                self
            }
        }
    };
}

pub(crate) use {with, with_common};
