//! Creator functions taking their dependencies as parameters

use crate::error::Error;

/// A creator function whose parameters are resolved from the container
/// before it is called.
///
/// Implemented for `Fn() -> R` and for `Fn(T1, ..., T5) -> Result<R, Error>`
/// where every parameter implements [`FromResolver`](super::FromResolver).
pub trait GenericFactory<Args>: Send + Sync + 'static {
    /// The created value
    type Output;

    /// Calls the function with already resolved parameters
    fn call(&self, args: Args) -> Result<Self::Output, Error>;
}

impl<F, R> GenericFactory<()> for F
where
    F: Fn() -> R + Send + Sync + 'static
{
    type Output = R;

    #[inline]
    fn call(&self, _: ()) -> Result<Self::Output, Error> {
        Ok(self())
    }
}

macro_rules! define_generic_factory ({ $($param:ident)* } => {
    impl<F, R, $($param,)*> GenericFactory<($($param,)*)> for F
    where
        F: Fn($($param),*) -> Result<R, Error> + Send + Sync + 'static,
    {
        type Output = R;

        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Result<Self::Output, Error> {
            (self)($($param,)*)
        }
    }
});

define_generic_factory! { T1 }
define_generic_factory! { T1 T2 }
define_generic_factory! { T1 T2 T3 }
define_generic_factory! { T1 T2 T3 T4 }
define_generic_factory! { T1 T2 T3 T4 T5 }
