//! Port-name predicates for [`Backend::get_ports`](crate::Backend::get_ports).

/// Decides whether a port name is selected by a query.
///
/// A plain string is a substring match (so `""` selects everything). Use
/// [`Exact`] or [`Prefix`] for stricter matching, or pass any
/// `Fn(&str) -> bool`.
pub trait PortMatcher {
    fn matches(&self, name: &str) -> bool;
}

impl PortMatcher for &str {
    fn matches(&self, name: &str) -> bool {
        name.contains(*self)
    }
}

impl PortMatcher for String {
    fn matches(&self, name: &str) -> bool {
        name.contains(self.as_str())
    }
}

impl PortMatcher for &String {
    fn matches(&self, name: &str) -> bool {
        name.contains(self.as_str())
    }
}

impl<F> PortMatcher for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, name: &str) -> bool {
        self(name)
    }
}

/// Whole-name equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exact<'a>(pub &'a str);

impl PortMatcher for Exact<'_> {
    fn matches(&self, name: &str) -> bool {
        name == self.0
    }
}

/// Name starts with the given prefix, e.g. `Prefix("system:")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix<'a>(pub &'a str);

impl PortMatcher for Prefix<'_> {
    fn matches(&self, name: &str) -> bool {
        name.starts_with(self.0)
    }
}
