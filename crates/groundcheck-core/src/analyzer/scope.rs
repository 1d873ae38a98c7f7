//! Lexical scope stack used during descent.
//!
//! Each scope is a frame plus a borrowed pointer to its parent. Entering a
//! class or function body creates a new child value on the caller's stack
//! frame; nothing is ever mutated, so sibling subtrees cannot observe each
//! other's scopes.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Frame<'a> {
    Class(&'a str),
    Function(&'a str),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Scope<'a> {
    frame: Option<Frame<'a>>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// Module-level scope.
    pub(crate) fn root() -> Self {
        Self {
            frame: None,
            parent: None,
        }
    }

    pub(crate) fn enter(&'a self, frame: Frame<'a>) -> Scope<'a> {
        Scope {
            frame: Some(frame),
            parent: Some(self),
        }
    }

    /// Class owning a definition made directly in this scope. A function
    /// nested inside a method is not itself a method.
    pub(crate) fn enclosing_class(&self) -> Option<&'a str> {
        match self.frame {
            Some(Frame::Class(name)) => Some(name),
            _ => None,
        }
    }

    /// Dotted path of enclosing names, outermost first.
    pub(crate) fn path(&self) -> Vec<&'a str> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(Frame::Class(name) | Frame::Function(name)) = scope.frame {
                names.push(name);
            }
            current = scope.parent;
        }
        names.reverse();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_no_class() {
        let root = Scope::root();
        assert_eq!(root.enclosing_class(), None);
        assert!(root.path().is_empty());
    }

    #[test]
    fn class_body_is_a_method_scope() {
        let root = Scope::root();
        let class = root.enter(Frame::Class("Widget"));
        assert_eq!(class.enclosing_class(), Some("Widget"));
    }

    #[test]
    fn nested_function_is_not_a_method_scope() {
        let root = Scope::root();
        let class = root.enter(Frame::Class("Widget"));
        let method = class.enter(Frame::Function("render"));
        assert_eq!(method.enclosing_class(), None);
        assert_eq!(method.path(), vec!["Widget", "render"]);
    }

    #[test]
    fn siblings_do_not_share_frames() {
        let root = Scope::root();
        let first = root.enter(Frame::Class("A"));
        let second = root.enter(Frame::Function("helper"));
        assert_eq!(first.enclosing_class(), Some("A"));
        assert_eq!(second.enclosing_class(), None);
        assert_eq!(second.path(), vec!["helper"]);
    }
}
