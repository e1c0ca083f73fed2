use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};

const UNSAFE_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

/// Renders markdown to HTML that is safe to embed in a stage.
///
/// Raw HTML blocks and inline HTML are emitted as escaped text, and link or
/// image targets with a script-capable scheme are replaced by `#`.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        Event::Start(Tag::Link(kind, destination, title)) => {
            Event::Start(Tag::Link(kind, neutralize(destination), title))
        }
        Event::Start(Tag::Image(kind, destination, title)) => {
            Event::Start(Tag::Image(kind, neutralize(destination), title))
        }
        other => other,
    });

    let mut output = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

/// Whether a URL may be used as a link target.
pub fn is_safe_url(url: &str) -> bool {
    let normalized = url
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();
    !UNSAFE_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}

fn neutralize(destination: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&destination) {
        destination
    } else {
        CowStr::Borrowed("#")
    }
}
