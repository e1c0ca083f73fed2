use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;

const QUESTION_HEADER: &str = r#"<h1 class="question-title">{{question}}{{#if mandatory}}<span class="required-mark">*</span>{{/if}}</h1>
{{#if description}}<p class="question-description">{{description}}</p>
{{/if}}"#;

const SHORT_ANSWER: &str = r#"<div class="question-block" data-element="{{name}}">
{{> question_header}}<input type="{{input_type}}" name="{{name}}"{{#if min}} min="{{min}}"{{/if}}{{#if max}} max="{{max}}"{{/if}} value="{{value}}"{{#if mandatory}} required{{/if}} />
</div>
"#;

const LONG_ANSWER: &str = r#"<div class="question-block" data-element="{{name}}">
{{> question_header}}<textarea name="{{name}}" rows="5" placeholder="{{placeholder}}"{{#if mandatory}} required{{/if}}>{{value}}</textarea>
</div>
"#;

const CHOICE_GROUP: &str = r#"<div class="question-block" data-element="{{name}}">
{{> question_header}}<div class="question-options{{#if likert}} likert-horizontal{{/if}}" data-question="{{name}}"{{#if group_required}} data-required="true"{{/if}}>
{{#each options}}<label{{#if selected}} class="selected"{{/if}}><input type="{{../input_type}}" name="{{../name}}" value="{{value}}"{{#if checked}} checked{{/if}}{{#if ../input_required}} required{{/if}} /><span>{{value}}</span></label>
{{/each}}</div>
</div>
"#;

const TEXT_BLOCK: &str = r#"<div class="question-block text-block" data-element="{{name}}">
<h1 class="text-title">{{title}}</h1>
<div class="text-content">{{{content}}}</div>
</div>
"#;

const FULLSCREEN: &str = r#"<div class="fullscreen-message">{{message}}</div>
"#;

const NEXT_STEP: &str = r#"<div class="sd-html">
<h5>{{title}}</h5>
<div class="next-step-description">{{{description}}}</div>
<a class="link-to-experiment" target="_parent" href="{{link}}">{{link_text}}</a>
</div>
"#;

const DOCUMENT: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{{title}}</title></head>
<body>
{{#each stages}}<section id="{{container_id}}" data-stage="{{name}}" data-trial-type="{{kind}}" data-hooks="{{hooks_json}}">
{{{html}}}{{#if button_label}}<button type="submit">{{button_label}}</button>
{{/if}}</section>
{{/each}}</body>
</html>
"#;

/// Templates known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    ShortAnswer,
    LongAnswer,
    ChoiceGroup,
    TextBlock,
    Fullscreen,
    NextStep,
    Document,
}

impl Template {
    pub const ALL: [Template; 7] = [
        Template::ShortAnswer,
        Template::LongAnswer,
        Template::ChoiceGroup,
        Template::TextBlock,
        Template::Fullscreen,
        Template::NextStep,
        Template::Document,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Template::ShortAnswer => "short_answer",
            Template::LongAnswer => "long_answer",
            Template::ChoiceGroup => "choice_group",
            Template::TextBlock => "text_block",
            Template::Fullscreen => "fullscreen",
            Template::NextStep => "next_step",
            Template::Document => "document",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Template::ShortAnswer => SHORT_ANSWER,
            Template::LongAnswer => LONG_ANSWER,
            Template::ChoiceGroup => CHOICE_GROUP,
            Template::TextBlock => TEXT_BLOCK,
            Template::Fullscreen => FULLSCREEN,
            Template::NextStep => NEXT_STEP,
            Template::Document => DOCUMENT,
        }
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to register template '{name}': {source}")]
    Register {
        name: &'static str,
        #[source]
        source: Box<handlebars::TemplateError>,
    },
    #[error("failed to render template '{name}': {source}")]
    Render {
        name: &'static str,
        #[source]
        source: Box<handlebars::RenderError>,
    },
}

/// Handlebars registry holding every fragment and stage template.
///
/// Double-stash expressions are HTML-escaped; only pre-rendered markdown and
/// already rendered stage fragments are inserted with triple-stash.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry
            .register_partial("question_header", QUESTION_HEADER)
            .map_err(|source| TemplateError::Register {
                name: "question_header",
                source: Box::new(source),
            })?;
        for template in Template::ALL {
            registry
                .register_template_string(template.name(), template.source())
                .map_err(|source| TemplateError::Register {
                    name: template.name(),
                    source: Box::new(source),
                })?;
        }
        Ok(Self { registry })
    }

    pub fn render<T: Serialize>(&self, template: Template, data: &T) -> Result<String, TemplateError> {
        self.registry
            .render(template.name(), data)
            .map_err(|source| TemplateError::Render {
                name: template.name(),
                source: Box::new(source),
            })
    }
}
