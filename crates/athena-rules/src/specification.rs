//! Composable predicates over an evaluation context.
//!
//! Rules are small async predicates that can be combined either with the
//! [`Specification::and`]/[`Specification::or`]/[`Specification::not`]
//! methods or, through the [`Spec`] wrapper, with `&`, `|` and `!`:
//!
//! ```ignore
//! let can_edit = Spec(IsExamOwner) & !Spec(ExamHasStarted);
//! ```

use std::ops::{BitAnd, BitOr, Not as StdNot};
use std::sync::Arc;

use async_trait::async_trait;

/// A business rule evaluated against a context.
#[async_trait]
pub trait Specification<Ctx>: Send + Sync {
    /// Check if the rule holds for the given context.
    async fn is_satisfied_by(&self, ctx: &Ctx) -> bool;

    /// Human-readable rule name, used when logging denials.
    fn describe(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    fn and<S: Specification<Ctx>>(self, other: S) -> And<Self, S>
    where
        Self: Sized,
    {
        And(self, other)
    }

    fn or<S: Specification<Ctx>>(self, other: S) -> Or<Self, S>
    where
        Self: Sized,
    {
        Or(self, other)
    }

    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }
}

/// Both rules must hold. The right side is not evaluated when the left fails.
#[derive(Clone)]
pub struct And<A, B>(pub A, pub B);

#[async_trait]
impl<Ctx, A, B> Specification<Ctx> for And<A, B>
where
    Ctx: Send + Sync,
    A: Specification<Ctx>,
    B: Specification<Ctx>,
{
    async fn is_satisfied_by(&self, ctx: &Ctx) -> bool {
        self.0.is_satisfied_by(ctx).await && self.1.is_satisfied_by(ctx).await
    }

    fn describe(&self) -> String {
        format!("({} & {})", self.0.describe(), self.1.describe())
    }
}

/// Either rule must hold. The right side is not evaluated when the left holds.
#[derive(Clone)]
pub struct Or<A, B>(pub A, pub B);

#[async_trait]
impl<Ctx, A, B> Specification<Ctx> for Or<A, B>
where
    Ctx: Send + Sync,
    A: Specification<Ctx>,
    B: Specification<Ctx>,
{
    async fn is_satisfied_by(&self, ctx: &Ctx) -> bool {
        self.0.is_satisfied_by(ctx).await || self.1.is_satisfied_by(ctx).await
    }

    fn describe(&self) -> String {
        format!("({} | {})", self.0.describe(), self.1.describe())
    }
}

/// Negation.
#[derive(Clone)]
pub struct Not<A>(pub A);

#[async_trait]
impl<Ctx, A> Specification<Ctx> for Not<A>
where
    Ctx: Send + Sync,
    A: Specification<Ctx>,
{
    async fn is_satisfied_by(&self, ctx: &Ctx) -> bool {
        !self.0.is_satisfied_by(ctx).await
    }

    fn describe(&self) -> String {
        format!("!{}", self.0.describe())
    }
}

/// A rule that always holds.
#[derive(Clone, Copy)]
pub struct AlwaysTrue;

#[async_trait]
impl<Ctx: Send + Sync> Specification<Ctx> for AlwaysTrue {
    async fn is_satisfied_by(&self, _ctx: &Ctx) -> bool {
        true
    }
}

/// A rule that never holds.
#[derive(Clone, Copy)]
pub struct AlwaysFalse;

#[async_trait]
impl<Ctx: Send + Sync> Specification<Ctx> for AlwaysFalse {
    async fn is_satisfied_by(&self, _ctx: &Ctx) -> bool {
        false
    }
}

/// Type-erased rule, for rules chosen at runtime.
pub type BoxedSpec<Ctx> = Arc<dyn Specification<Ctx>>;

#[async_trait]
impl<Ctx: Send + Sync> Specification<Ctx> for BoxedSpec<Ctx> {
    async fn is_satisfied_by(&self, ctx: &Ctx) -> bool {
        self.as_ref().is_satisfied_by(ctx).await
    }

    fn describe(&self) -> String {
        self.as_ref().describe()
    }
}

/// Operator wrapper: `Spec(a) & Spec(b)`, `Spec(a) | Spec(b)`, `!Spec(a)`.
#[derive(Clone)]
pub struct Spec<S>(pub S);

impl<A, B> BitAnd<Spec<B>> for Spec<A> {
    type Output = Spec<And<A, B>>;

    fn bitand(self, rhs: Spec<B>) -> Self::Output {
        Spec(And(self.0, rhs.0))
    }
}

impl<A, B> BitOr<Spec<B>> for Spec<A> {
    type Output = Spec<Or<A, B>>;

    fn bitor(self, rhs: Spec<B>) -> Self::Output {
        Spec(Or(self.0, rhs.0))
    }
}

impl<A> StdNot for Spec<A> {
    type Output = Spec<Not<A>>;

    fn not(self) -> Self::Output {
        Spec(Not(self.0))
    }
}

#[async_trait]
impl<Ctx, S> Specification<Ctx> for Spec<S>
where
    Ctx: Send + Sync,
    S: Specification<Ctx>,
{
    async fn is_satisfied_by(&self, ctx: &Ctx) -> bool {
        self.0.is_satisfied_by(ctx).await
    }

    fn describe(&self) -> String {
        self.0.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting<'a> {
        calls: &'a AtomicUsize,
        answer: bool,
    }

    #[async_trait]
    impl Specification<()> for Counting<'_> {
        async fn is_satisfied_by(&self, _ctx: &()) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    #[tokio::test]
    async fn test_operators() {
        assert!((Spec(AlwaysTrue) & Spec(AlwaysTrue)).is_satisfied_by(&()).await);
        assert!(!(Spec(AlwaysTrue) & Spec(AlwaysFalse)).is_satisfied_by(&()).await);
        assert!((Spec(AlwaysFalse) | Spec(AlwaysTrue)).is_satisfied_by(&()).await);
        assert!(!(!Spec(AlwaysTrue)).is_satisfied_by(&()).await);
        assert!(((Spec(AlwaysTrue) & !Spec(AlwaysFalse)) | Spec(AlwaysFalse))
            .is_satisfied_by(&())
            .await);
    }

    #[tokio::test]
    async fn test_and_short_circuits() {
        let calls = AtomicUsize::new(0);
        let rule = Specification::<()>::and(
            AlwaysFalse,
            Counting {
                calls: &calls,
                answer: true,
            },
        );
        assert!(!rule.is_satisfied_by(&()).await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_or_short_circuits() {
        let calls = AtomicUsize::new(0);
        let rule = Specification::<()>::or(
            AlwaysTrue,
            Counting {
                calls: &calls,
                answer: false,
            },
        );
        assert!(rule.is_satisfied_by(&()).await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_boxed_spec() {
        let boxed: BoxedSpec<()> = Arc::new(AlwaysTrue);
        assert!(boxed.is_satisfied_by(&()).await);
    }

    #[test]
    fn test_describe_composite() {
        let rule = Spec(AlwaysTrue) & !Spec(AlwaysFalse);
        assert_eq!(
            Specification::<()>::describe(&rule),
            "(AlwaysTrue & !AlwaysFalse)"
        );
    }
}
