use super::constraint::ParamConstraint;
use crate::error::Error;
use std::sync::Arc;

/// One tokenized segment of a route pattern.
#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Static(String),
    Named(Arc<str>),
    Typed(Arc<str>, ParamConstraint),
    Wildcard,
    CatchAll,
}

/// Split a `/`-separated pattern into its segments, validating grammar.
pub(crate) fn tokenize(pattern: &str) -> Result<Vec<Segment>, Error> {
    if !pattern.starts_with('/') {
        return Err(Error::BadPattern(format!(
            "pattern '{pattern}' must start with '/'"
        )));
    }
    let raw_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let mut segments = Vec::with_capacity(raw_segments.len());
    for (i, raw) in raw_segments.iter().enumerate() {
        let seg = parse_segment(raw)?;
        if matches!(seg, Segment::CatchAll) && i != raw_segments.len() - 1 {
            return Err(Error::BadPattern(format!(
                "'**' must be the final segment in pattern '{pattern}'"
            )));
        }
        segments.push(seg);
    }
    Ok(segments)
}

fn parse_segment(raw: &str) -> Result<Segment, Error> {
    if raw == "**" {
        return Ok(Segment::CatchAll);
    }
    if raw == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some(stripped) = raw.strip_prefix(':') {
        if stripped.is_empty() {
            return Err(Error::BadPattern("empty parameter name after ':'".into()));
        }
        return Ok(Segment::Named(Arc::from(stripped)));
    }
    if let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if inner.is_empty() {
            return Err(Error::BadPattern("empty '{}' parameter".into()));
        }
        return match inner.split_once(':') {
            Some((name, spec)) => {
                if name.is_empty() {
                    return Err(Error::BadPattern("empty parameter name before ':'".into()));
                }
                let constraint = ParamConstraint::parse(spec).map_err(Error::BadPattern)?;
                Ok(Segment::Typed(Arc::from(name), constraint))
            }
            None => Ok(Segment::Named(Arc::from(inner))),
        };
    }
    Ok(Segment::Static(raw.to_string()))
}

/// A node in the per-method route trie.
pub(crate) struct RouteNode<T> {
    pub segment: String,
    pub param_name: Option<Arc<str>>,
    pub constraint: Option<ParamConstraint>,
    pub static_children: Vec<RouteNode<T>>,
    pub typed_child: Option<Box<RouteNode<T>>>,
    pub named_child: Option<Box<RouteNode<T>>>,
    pub wildcard_child: Option<Box<RouteNode<T>>>,
    pub catch_all_child: Option<Box<RouteNode<T>>>,
    pub handlers: Option<Arc<T>>,
}

impl<T> Default for RouteNode<T> {
    fn default() -> Self {
        RouteNode {
            segment: String::new(),
            param_name: None,
            constraint: None,
            static_children: Vec::new(),
            typed_child: None,
            named_child: None,
            wildcard_child: None,
            catch_all_child: None,
            handlers: None,
        }
    }
}

impl<T> RouteNode<T> {
    pub(crate) fn insert(&mut self, segments: &[Segment], handlers: Arc<T>) -> Result<(), Error> {
        let Some((first, rest)) = segments.split_first() else {
            self.handlers = Some(handlers);
            return Ok(());
        };
        match first {
            Segment::Static(text) => {
                if let Some(child) = self
                    .static_children
                    .iter_mut()
                    .find(|c| c.segment == *text)
                {
                    child.insert(rest, handlers)
                } else {
                    let mut child = RouteNode {
                        segment: text.clone(),
                        ..Default::default()
                    };
                    child.insert(rest, handlers)?;
                    self.static_children.push(child);
                    Ok(())
                }
            }
            Segment::Typed(name, constraint) => {
                if let Some(existing) = &mut self.typed_child {
                    if existing.constraint.as_ref() != Some(constraint) {
                        return Err(Error::BadPattern(format!(
                            "conflicting typed-parameter constraints for segment after '{}'",
                            existing.segment
                        )));
                    }
                    existing.insert(rest, handlers)
                } else {
                    let mut child = RouteNode {
                        param_name: Some(name.clone()),
                        constraint: Some(constraint.clone()),
                        ..Default::default()
                    };
                    child.insert(rest, handlers)?;
                    self.typed_child = Some(Box::new(child));
                    Ok(())
                }
            }
            Segment::Named(name) => {
                if let Some(existing) = &mut self.named_child {
                    existing.insert(rest, handlers)
                } else {
                    let mut child = RouteNode {
                        param_name: Some(name.clone()),
                        ..Default::default()
                    };
                    child.insert(rest, handlers)?;
                    self.named_child = Some(Box::new(child));
                    Ok(())
                }
            }
            Segment::Wildcard => {
                if let Some(existing) = &mut self.wildcard_child {
                    existing.insert(rest, handlers)
                } else {
                    let mut child = RouteNode {
                        param_name: Some(Arc::from("*")),
                        ..Default::default()
                    };
                    child.insert(rest, handlers)?;
                    self.wildcard_child = Some(Box::new(child));
                    Ok(())
                }
            }
            Segment::CatchAll => {
                let node = self.catch_all_child.get_or_insert_with(|| {
                    Box::new(RouteNode {
                        param_name: Some(Arc::from("*")),
                        ..Default::default()
                    })
                });
                node.handlers = Some(handlers);
                Ok(())
            }
        }
    }
}
