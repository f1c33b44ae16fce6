//! Display ordering for a profile's links.

use std::cmp::Ordering;

use crate::models::Link;

/// Order links for display: ascending ordinal, newest first among equal
/// ordinals. A link without a creation time sorts like one created at zero.
pub fn sort_links(links: &mut [Link]) {
    links.sort_by(display_order);
}

/// Active links in display order, as shown on the public page.
pub fn visible_links(links: impl IntoIterator<Item = Link>) -> Vec<Link> {
    let mut visible: Vec<Link> = links.into_iter().filter(|link| link.is_active).collect();
    sort_links(&mut visible);
    visible
}

/// Sum of click counts over `links`.
pub fn total_clicks(links: &[Link]) -> u64 {
    links.iter().map(|link| link.click_count).sum()
}

fn display_order(a: &Link, b: &Link) -> Ordering {
    a.order.cmp(&b.order).then_with(|| {
        let a_created = a.created_at.unwrap_or(0);
        let b_created = b.created_at.unwrap_or(0);
        b_created.cmp(&a_created)
    })
}
