//! Selector matching against a [`Document`].
//!
//! Complex selectors are matched right to left: the rightmost compound is
//! tested on the candidate, then each combinator walks towards the root,
//! backtracking over every ancestor or sibling that could satisfy it.

use crate::error::Result;
use crate::selector::{
    AttrOperator, AttrSelector, Combinator, Compound, Part, PseudoClass, SelectorList,
};
use crate::tree::{Document, Element, NodeId};

impl Document {
    /// Connected elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select(&list))
    }

    pub fn count_matches(&self, selector: &str) -> Result<usize> {
        self.query_selector_all(selector).map(|nodes| nodes.len())
    }

    pub fn select(&self, list: &SelectorList) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|node| self.matches(*node, list))
            .collect()
    }

    pub fn matches(&self, node: NodeId, list: &SelectorList) -> bool {
        list.selectors
            .iter()
            .any(|complex| self.matches_parts(node, &complex.parts))
    }

    fn matches_parts(&self, node: NodeId, parts: &[Part]) -> bool {
        let Some((last, rest)) = parts.split_last() else {
            return false;
        };
        if !self.matches_compound(node, &last.compound) {
            return false;
        }
        let Some(combinator) = last.combinator else {
            return rest.is_empty();
        };

        match combinator {
            Combinator::Child => self
                .parent_element(node)
                .is_some_and(|parent| self.matches_parts(parent, rest)),
            Combinator::Descendant => {
                let mut cursor = self.parent_element(node);
                while let Some(ancestor) = cursor {
                    if self.matches_parts(ancestor, rest) {
                        return true;
                    }
                    cursor = self.parent_element(ancestor);
                }
                false
            }
            Combinator::NextSibling => self
                .previous_element_sibling(node)
                .is_some_and(|sibling| self.matches_parts(sibling, rest)),
            Combinator::SubsequentSibling => {
                let mut cursor = self.previous_element_sibling(node);
                while let Some(sibling) = cursor {
                    if self.matches_parts(sibling, rest) {
                        return true;
                    }
                    cursor = self.previous_element_sibling(sibling);
                }
                false
            }
        }
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.element(node) else {
            return false;
        };
        if compound.tag.as_deref().is_some_and(|tag| element.tag() != tag) {
            return false;
        }
        compound
            .ids
            .iter()
            .all(|id| element.attr("id") == Some(id.as_str()))
            && compound.classes.iter().all(|class| element.has_class(class))
            && compound.attrs.iter().all(|attr| attr_matches(element, attr))
            && compound
                .pseudos
                .iter()
                .all(|pseudo| self.matches_pseudo(node, pseudo))
    }

    fn matches_pseudo(&self, node: NodeId, pseudo: &PseudoClass) -> bool {
        let position = |of_type: bool| self.sibling_position(node, of_type);
        match pseudo {
            PseudoClass::Root => node == self.html(),
            PseudoClass::Empty => self
                .children(node)
                .iter()
                .all(|child| self.text(*child).is_some_and(str::is_empty)),
            PseudoClass::FirstChild => position(false).is_some_and(|(i, _)| i == 1),
            PseudoClass::LastChild => position(false).is_some_and(|(i, n)| i == n),
            PseudoClass::OnlyChild => position(false).is_some_and(|(_, n)| n == 1),
            PseudoClass::FirstOfType => position(true).is_some_and(|(i, _)| i == 1),
            PseudoClass::LastOfType => position(true).is_some_and(|(i, n)| i == n),
            PseudoClass::OnlyOfType => position(true).is_some_and(|(_, n)| n == 1),
            PseudoClass::NthChild(nth) => position(false).is_some_and(|(i, _)| nth.matches(i)),
            PseudoClass::NthLastChild(nth) => {
                position(false).is_some_and(|(i, n)| nth.matches(n + 1 - i))
            }
            PseudoClass::NthOfType(nth) => position(true).is_some_and(|(i, _)| nth.matches(i)),
            PseudoClass::NthLastOfType(nth) => {
                position(true).is_some_and(|(i, n)| nth.matches(n + 1 - i))
            }
            PseudoClass::Not(list) => !self.matches(node, list),
            PseudoClass::Is(list) => self.matches(node, list),
        }
    }

    /// 1-based position among element siblings and the sibling count,
    /// optionally restricted to siblings with the same tag.
    pub fn sibling_position(&self, node: NodeId, of_type: bool) -> Option<(usize, usize)> {
        let parent = self.parent(node)?;
        let tag = self.tag_name(node)?;
        let mut index = None;
        let mut total = 0;
        for sibling in self.element_children(parent) {
            if of_type && self.tag_name(sibling) != Some(tag) {
                continue;
            }
            total += 1;
            if sibling == node {
                index = Some(total);
            }
        }
        index.map(|i| (i, total))
    }
}

fn attr_matches(element: &Element, selector: &AttrSelector) -> bool {
    let Some(actual) = element.attr(&selector.name) else {
        return false;
    };
    let (actual, expected) = if selector.case_insensitive {
        (actual.to_lowercase(), selector.value.to_lowercase())
    } else {
        (actual.to_string(), selector.value.clone())
    };

    match selector.operator {
        AttrOperator::Exists => true,
        AttrOperator::Equals => actual == expected,
        AttrOperator::Includes => {
            !expected.is_empty() && actual.split_ascii_whitespace().any(|word| word == expected)
        }
        AttrOperator::DashMatch => {
            actual == expected || actual.starts_with(&format!("{expected}-"))
        }
        AttrOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
        AttrOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
        AttrOperator::Substring => !expected.is_empty() && actual.contains(&expected),
    }
}
