//! Shared pieces of the `Event`/`ToDo` domain shape (§3's "Items"): the `UID`-addressed
//! `RELATED-TO` parent/child link used by cascading delete (§4.7), and the bookkeeping that
//! lets `Calendar::encode` reproduce a decoded item's original property order (§8, invariant 1).

use icalx_ical::content_line::ContentLine;

/// A `RELATED-TO` reference, decoded alongside the passive-property table (§3) because the
/// store's cascading delete (§4.7) needs to walk this graph even though the codec treats the
/// property itself as opaque text.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RelatedTo {
    pub reltype: String,
    pub uid: String,
}

impl RelatedTo {
    pub fn is_parent(&self) -> bool {
        self.reltype.eq_ignore_ascii_case("PARENT")
    }

    pub(crate) fn decode(content_line: &ContentLine) -> Self {
        let reltype = content_line.params().get("RELTYPE").unwrap_or("PARENT").to_string();
        let uid = icalx_ical::properties::unescape_text(content_line.raw_value());

        Self { reltype, uid }
    }
}

/// Where one property slot sits in an item's original content-line order: either a typed field
/// (recorded once, at its first occurrence — repeated/merged properties like `RDATE` re-emit as
/// one consolidated line per §9) or an index into the item's passive-property list (recorded
/// once per physical occurrence, since repeated passive lines like `ATTENDEE` must each survive
/// round-trip individually).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OrderSlot {
    Typed(&'static str),
    Passive(usize),
}

/// Accumulates `OrderSlot`s and the passive-property list while an item decodes, then replays
/// them in original order on encode.
#[derive(Debug, Clone, Default)]
pub struct PropertyOrder {
    slots: Vec<OrderSlot>,
    seen_typed: std::collections::HashSet<&'static str>,
    pub passive: Vec<ContentLine>,
    pub related_to: Vec<RelatedTo>,
}

impl PropertyOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a typed property's name at its first occurrence only.
    pub fn mark_typed(&mut self, name: &'static str) {
        if self.seen_typed.insert(name) {
            self.slots.push(OrderSlot::Typed(name));
        }
    }

    /// Records a passive content line, extracting a `RELATED-TO` shadow entry when relevant.
    pub fn push_passive(&mut self, content_line: ContentLine) {
        if content_line.name().eq_ignore_ascii_case("RELATED-TO") {
            self.related_to.push(RelatedTo::decode(&content_line));
        }

        self.slots.push(OrderSlot::Passive(self.passive.len()));
        self.passive.push(content_line);
    }

    pub fn slots(&self) -> &[OrderSlot] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_typed_dedupes_repeated_names() {
        let mut order = PropertyOrder::new();
        order.mark_typed("UID");
        order.mark_typed("DTSTART");
        order.mark_typed("UID");

        assert_eq!(order.slots(), &[OrderSlot::Typed("UID"), OrderSlot::Typed("DTSTART")]);
    }

    #[test]
    fn push_passive_extracts_related_to() {
        let mut order = PropertyOrder::new();
        let content_line = ContentLine::from(("RELATED-TO", vec![("RELTYPE", "PARENT")], "parent-uid"));
        order.push_passive(content_line);

        assert_eq!(order.related_to, vec![RelatedTo { reltype: String::from("PARENT"), uid: String::from("parent-uid") }]);
        assert_eq!(order.slots(), &[OrderSlot::Passive(0)]);
    }

    #[test]
    fn related_to_defaults_reltype_to_parent() {
        let content_line = ContentLine::from(("RELATED-TO", vec![], "parent-uid"));

        assert_eq!(RelatedTo::decode(&content_line), RelatedTo { reltype: String::from("PARENT"), uid: String::from("parent-uid") });
        assert!(RelatedTo::decode(&content_line).is_parent());
    }
}
