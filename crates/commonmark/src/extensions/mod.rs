//! Extensions bundled with the CommonMark parser.

mod gfm;
mod link_renderer;
mod smart_punctuation;

pub use gfm::{GFM_ID, GfmFeature, GithubFlavoredMarkdown};
pub use link_renderer::LinkRenderer;
pub use smart_punctuation::{Quotes, SmartPunctuation, apply_smart_punctuation};

use markguard_core::Extension;

/// Every bundled extension, in registration order.
pub fn bundled_extensions() -> Vec<Box<dyn Extension>> {
    let mut extensions: Vec<Box<dyn Extension>> = vec![
        Box::new(LinkRenderer::new()),
        Box::new(SmartPunctuation),
    ];
    extensions.extend(
        GfmFeature::ALL
            .into_iter()
            .map(|feature| Box::new(feature) as Box<dyn Extension>),
    );
    extensions.push(Box::new(GithubFlavoredMarkdown));
    extensions
}
