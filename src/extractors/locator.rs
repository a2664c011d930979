// src/extractors/locator.rs
//! Ordered-fallback element lookup.
//!
//! A [`Locator`] holds candidate [`Strategy`] values in priority order. The first strategy
//! yielding at least one element wins; later strategies are never consulted and matches
//! from different strategies are never merged. Earlier strategies describe the markup the
//! sites currently serve, later ones older or alternate layouts.

use scraper::{ElementRef, Selector};

use crate::extractors::normalize::squash_whitespace;

/// Filter applied to every element matched by a strategy's path.
#[derive(Debug)]
pub enum Predicate {
    Any,
    /// Element has a descendant matching the selector.
    HasDescendant(Selector),
    /// Whitespace-normalized text equals the string.
    TextIs(&'static str),
    /// Whitespace-normalized text contains the string.
    TextContains(&'static str),
    /// Attribute exists and its value contains the string.
    AttrContains(&'static str, &'static str),
}

impl Predicate {
    fn accepts(&self, element: ElementRef<'_>) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::HasDescendant(selector) => element.select(selector).next().is_some(),
            Predicate::TextIs(expected) => element_text(element) == *expected,
            Predicate::TextContains(needle) => element_text(element).contains(needle),
            Predicate::AttrContains(attr, needle) => {
                element.value().attr(attr).map_or(false, |v| v.contains(needle))
            }
        }
    }
}

/// Optional hop from a matched element to the node actually wanted.
#[derive(Debug)]
pub enum Traversal {
    Itself,
    /// First following sibling element matching the selector.
    NextSibling(Selector),
    /// First element after the match in document order (outside its subtree) matching the selector.
    Following(Selector),
    /// Closest ancestor element.
    Parent,
}

impl Traversal {
    fn apply<'a>(&self, element: ElementRef<'a>) -> Option<ElementRef<'a>> {
        match self {
            Traversal::Itself => Some(element),
            Traversal::NextSibling(selector) => element
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sib| selector.matches(sib)),
            Traversal::Following(selector) => following_elements(element).find(|el| selector.matches(el)),
            Traversal::Parent => element.parent().and_then(ElementRef::wrap),
        }
    }
}

/// One candidate way of finding a value: containment path, predicate, traversal.
#[derive(Debug)]
pub struct Strategy {
    path: Selector,
    predicate: Predicate,
    traversal: Traversal,
}

impl Strategy {
    /// Strategy over a CSS path. Paths are static literals; an invalid one is a programming error.
    pub fn css(path: &str) -> Self {
        let selector = Selector::parse(path).unwrap_or_else(|e| panic!("invalid locator path '{}': {:?}", path, e));
        Self { path: selector, predicate: Predicate::Any, traversal: Traversal::Itself }
    }

    pub fn having(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn then(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Pure matcher: all nodes this strategy yields under `scope`, in document order.
    pub fn apply<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        let mut nodes: Vec<ElementRef<'a>> = Vec::new();
        for element in scope.select(&self.path).filter(|el| self.predicate.accepts(*el)) {
            if let Some(target) = self.traversal.apply(element) {
                if !nodes.iter().any(|n| n.id() == target.id()) {
                    nodes.push(target);
                }
            }
        }
        nodes
    }
}

/// Outcome of a lookup.
#[derive(Debug)]
pub enum Located<'a> {
    Found { strategy: usize, nodes: Vec<ElementRef<'a>> },
    NotFound,
}

impl<'a> Located<'a> {
    pub fn nodes(self) -> Vec<ElementRef<'a>> {
        match self {
            Located::Found { nodes, .. } => nodes,
            Located::NotFound => Vec::new(),
        }
    }

    pub fn first(&self) -> Option<ElementRef<'a>> {
        match self {
            Located::Found { nodes, .. } => nodes.first().copied(),
            Located::NotFound => None,
        }
    }

    pub fn strategy(&self) -> Option<usize> {
        match self {
            Located::Found { strategy, .. } => Some(*strategy),
            Located::NotFound => None,
        }
    }
}

#[derive(Debug)]
pub struct Locator {
    name: &'static str,
    strategies: Vec<Strategy>,
}

impl Locator {
    pub fn new(name: &'static str, strategies: Vec<Strategy>) -> Self {
        Self { name, strategies }
    }

    /// Node set of the first strategy that matches anything under `scope`.
    pub fn locate<'a>(&self, scope: ElementRef<'a>) -> Located<'a> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            let nodes = strategy.apply(scope);
            if nodes.is_empty() {
                continue;
            }
            if index > 0 {
                tracing::info!("Locator '{}' fell back to strategy #{} ({} node(s))", self.name, index, nodes.len());
            } else {
                tracing::trace!("Locator '{}' matched primary strategy ({} node(s))", self.name, nodes.len());
            }
            return Located::Found { strategy: index, nodes };
        }
        tracing::debug!("Locator '{}' found nothing", self.name);
        Located::NotFound
    }

    /// First node of the winning strategy.
    pub fn first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.locate(scope).first()
    }

    /// Structural scan: every container the winning strategy yields (empty when none).
    pub fn scan<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.locate(scope).nodes()
    }
}

/// Value extractor used in ordered text fallbacks.
pub type TextStrategy = for<'a> fn(ElementRef<'a>) -> Option<String>;

/// First non-empty value produced by `strategies`, tried in order.
pub fn first_text(element: ElementRef<'_>, strategies: &[TextStrategy]) -> Option<String> {
    strategies
        .iter()
        .filter_map(|strategy| strategy(element))
        .find(|value| !value.trim().is_empty())
}

/// Elements after `element` in document order, excluding its own subtree.
pub fn following_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    std::iter::successors(Some(*element), |node| node.parent())
        .flat_map(|node| node.next_siblings())
        .flat_map(|sibling| sibling.descendants())
        .filter_map(ElementRef::wrap)
}

fn element_text(element: ElementRef<'_>) -> String {
    squash_whitespace(&element.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn texts(nodes: &[ElementRef<'_>]) -> Vec<String> {
        nodes.iter().map(|n| element_text(*n)).collect()
    }

    fn item_locator() -> Locator {
        Locator::new("items", vec![Strategy::css(".primary .item"), Strategy::css(".alt .item")])
    }

    #[test]
    fn first_matching_strategy_wins() {
        let doc = Html::parse_document(
            r#"<div class="primary"><span class="item">a</span></div><div class="alt"><span class="item">b</span></div>"#,
        );
        let located = item_locator().locate(doc.root_element());
        assert_eq!(located.strategy(), Some(0));
        assert_eq!(texts(&located.nodes()), vec!["a"]);
    }

    #[test]
    fn fallback_result_is_identical_whether_earlier_strategy_is_empty_or_absent() {
        let with_empty_primary = Html::parse_document(
            r#"<div class="primary"></div><div class="alt"><span class="item">b1</span><span class="item">b2</span></div>"#,
        );
        let without_primary =
            Html::parse_document(r#"<div class="alt"><span class="item">b1</span><span class="item">b2</span></div>"#);

        let a = item_locator().locate(with_empty_primary.root_element());
        let b = item_locator().locate(without_primary.root_element());
        assert_eq!(a.strategy(), Some(1));
        assert_eq!(b.strategy(), Some(1));
        assert_eq!(texts(&a.nodes()), texts(&b.nodes()));
    }

    #[test]
    fn never_merges_strategies() {
        let doc = Html::parse_document(
            r#"<div class="primary"><span class="item">a</span></div><div class="alt"><span class="item">b</span></div>"#,
        );
        assert_eq!(item_locator().scan(doc.root_element()).len(), 1);
    }

    #[test]
    fn not_found_when_nothing_matches() {
        let doc = Html::parse_document("<p>nothing here</p>");
        let located = item_locator().locate(doc.root_element());
        assert!(matches!(located, Located::NotFound));
        assert!(item_locator().first(doc.root_element()).is_none());
    }

    #[test]
    fn scan_with_descendant_predicate() {
        let doc = Html::parse_document(
            r#"<div class="content">
                <div class="header"><img class="flag" alt="ES">Spain</div>
                <div class="header">Ads</div>
                <div class="header"><img class="flag" alt="EN">England</div>
            </div>"#,
        );
        let flag = Selector::parse("img.flag").unwrap();
        let locator = Locator::new("leagues", vec![Strategy::css("div.header").having(Predicate::HasDescendant(flag))]);
        assert_eq!(texts(&locator.scan(doc.root_element())), vec!["Spain", "England"]);
    }

    #[test]
    fn text_predicates_and_traversals() {
        let doc = Html::parse_document(
            r#"<section>
                <h2>Apuesta combinada de la jornada</h2>
                <div>skip</div>
                <p>first</p>
                <p>second</p>
            </section>
            <section><h3>Favoritos para ganar la liga española</h3></section>
            <figure class="wp-block-table"><table><tr><td>x</td></tr></table></figure>"#,
        );
        let root = doc.root_element();

        let exact = Locator::new(
            "combined",
            vec![Strategy::css("h2")
                .having(Predicate::TextIs("Apuesta combinada de la jornada"))
                .then(Traversal::NextSibling(Selector::parse("p").unwrap()))],
        );
        assert_eq!(element_text(exact.first(root).unwrap()), "first");

        let parent = Locator::new(
            "parent",
            vec![Strategy::css("h2").having(Predicate::TextContains("combinada")).then(Traversal::Parent)],
        );
        assert_eq!(parent.first(root).unwrap().value().name(), "section");

        let following = Locator::new(
            "favorites table",
            vec![Strategy::css("h3")
                .having(Predicate::TextContains("Favoritos"))
                .then(Traversal::Following(Selector::parse("figure.wp-block-table table").unwrap()))],
        );
        assert_eq!(element_text(following.first(root).unwrap()), "x");
    }

    #[test]
    fn attribute_predicate() {
        let doc = Html::parse_document(r#"<a href="/autor/ana">Ana</a><a href="/tag/x">X</a>"#);
        let locator = Locator::new("authors", vec![Strategy::css("a").having(Predicate::AttrContains("href", "/autor/"))]);
        assert_eq!(texts(&locator.scan(doc.root_element())), vec!["Ana"]);
    }

    #[test]
    fn following_elements_skips_own_subtree() {
        let doc = Html::parse_document(r#"<div id="a"><span>inside</span></div><p>after</p>"#);
        let div = doc.select(&Selector::parse("div#a").unwrap()).next().unwrap();
        let names: Vec<&str> = following_elements(div).map(|e| e.value().name()).collect();
        assert_eq!(names, vec!["p"]);
    }

    #[test]
    fn first_text_tries_in_order() {
        let doc = Html::parse_document(r#"<div><a>Link name</a></div>"#);
        let div = doc.select(&Selector::parse("div").unwrap()).next().unwrap();
        let strategies: [TextStrategy; 3] = [
            |_| None,
            |_| Some("   ".to_string()),
            |el| el.select(&Selector::parse("a").unwrap()).next().map(element_text),
        ];
        assert_eq!(first_text(div, &strategies).as_deref(), Some("Link name"));
    }
}
