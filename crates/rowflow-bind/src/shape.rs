use bson::Bson;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Writes one normalized column value into a field of `T`.
pub type Setter<T> = fn(&mut T, Option<Bson>) -> Result<(), BoxError>;

/// A settable field of a record shape.
pub struct FieldDef<T> {
    name: &'static str,
    set: Setter<T>,
}

impl<T> FieldDef<T> {
    pub const fn new(name: &'static str, set: Setter<T>) -> Self {
        Self { name, set }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn setter(&self) -> Setter<T> {
        self.set
    }
}

impl<T> Clone for FieldDef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldDef<T> {}

/// A record type rows can be materialized into.
///
/// Records start from `Default` and are filled field by field, so a column
/// that is missing from the layout leaves its field at the default.
pub trait Shape: Default + Send + 'static {
    /// Every settable field, in declaration order.
    fn fields() -> Vec<FieldDef<Self>>;
}

/// Implement [`Shape`] for a struct whose listed fields deserialize from
/// [`Bson`] (via serde).
///
/// ```
/// #[derive(Default)]
/// struct Account {
///     id: i64,
///     name: Option<String>,
/// }
///
/// rowflow_bind::shape!(Account { id, name });
/// ```
#[macro_export]
macro_rules! shape {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::Shape for $ty {
            fn fields() -> ::std::vec::Vec<$crate::FieldDef<Self>> {
                ::std::vec![$(
                    $crate::FieldDef::<$ty>::new(
                        ::std::stringify!($field),
                        |record: &mut $ty,
                         value: ::std::option::Option<$crate::Bson>|
                         -> ::std::result::Result<(), $crate::BoxError> {
                            record.$field = $crate::from_value(value)?;
                            ::std::result::Result::Ok(())
                        },
                    )
                ),+]
            }
        }
    };
}
