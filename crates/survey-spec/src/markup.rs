use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    markdown::render_markdown,
    responses::{ExperimentResult, PriorAnswers},
    spec::element::{LongAnswer, ShortAnswer, SurveyElement, TextElement},
    template::{Template, TemplateEngine, TemplateError},
};

const LONG_ANSWER_PLACEHOLDER: &str = "Type your response here...";

/// Whether a fragment collects a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Question,
    Information,
}

/// Control rendered for an element; decided by the element type alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    TextInput,
    TextArea,
    RadioGroup,
    CheckboxGroup,
    None,
}

/// Markup generated for one survey element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    pub name: String,
    pub kind: FragmentKind,
    pub control: ControlKind,
    /// Set for Likert groups, whose labels track the selected option.
    pub highlight_selection: bool,
    pub html: String,
}

/// Renders one element, pre-filled from `prior`.
pub fn generate_fragment(
    engine: &TemplateEngine,
    element: &SurveyElement,
    prior: &PriorAnswers,
) -> Result<Fragment, TemplateError> {
    match element {
        SurveyElement::ShortAnswer(short) => short_answer(engine, short, prior),
        SurveyElement::LongAnswer(long) => long_answer(engine, long, prior),
        SurveyElement::MultipleChoice(choice) => choice_group(
            engine,
            ChoiceGroup {
                element,
                options: &choice.answers,
                multiple: false,
                likert: false,
            },
            prior,
        ),
        SurveyElement::MultiAnswer(multi) => choice_group(
            engine,
            ChoiceGroup {
                element,
                options: &multi.answers,
                multiple: true,
                likert: false,
            },
            prior,
        ),
        SurveyElement::LikertScale(likert) => choice_group(
            engine,
            ChoiceGroup {
                element,
                options: &likert.scale,
                multiple: false,
                likert: true,
            },
            prior,
        ),
        SurveyElement::Text(text) => text_block(engine, text),
    }
}

/// Convenience wrapper that builds its own engine and answer index.
pub fn fragment_for(
    element: &SurveyElement,
    prior_result: Option<&ExperimentResult>,
) -> Result<Fragment, TemplateError> {
    let engine = TemplateEngine::new()?;
    let prior = PriorAnswers::from_result(prior_result);
    generate_fragment(&engine, element, &prior)
}

fn short_answer(
    engine: &TemplateEngine,
    element: &ShortAnswer,
    prior: &PriorAnswers,
) -> Result<Fragment, TemplateError> {
    let bounds = element.data_validation.as_ref();
    let data = json!({
        "name": element.name,
        "question": element.question,
        "description": element.description,
        "mandatory": element.mandatory,
        "input_type": element.answer_type.as_str(),
        "min": bounds.and_then(|bounds| bounds.min_for(element.answer_type)),
        "max": bounds.and_then(|bounds| bounds.max_for(element.answer_type)),
        "value": prior.text(&element.name).unwrap_or_default(),
    });
    Ok(Fragment {
        name: element.name.clone(),
        kind: FragmentKind::Question,
        control: ControlKind::TextInput,
        highlight_selection: false,
        html: engine.render(Template::ShortAnswer, &data)?,
    })
}

fn long_answer(
    engine: &TemplateEngine,
    element: &LongAnswer,
    prior: &PriorAnswers,
) -> Result<Fragment, TemplateError> {
    let data = json!({
        "name": element.name,
        "question": element.question,
        "description": element.description,
        "mandatory": element.mandatory,
        "placeholder": LONG_ANSWER_PLACEHOLDER,
        "value": prior.text(&element.name).unwrap_or_default(),
    });
    Ok(Fragment {
        name: element.name.clone(),
        kind: FragmentKind::Question,
        control: ControlKind::TextArea,
        highlight_selection: false,
        html: engine.render(Template::LongAnswer, &data)?,
    })
}

struct ChoiceGroup<'a> {
    element: &'a SurveyElement,
    options: &'a [String],
    multiple: bool,
    likert: bool,
}

fn choice_group(
    engine: &TemplateEngine,
    group: ChoiceGroup<'_>,
    prior: &PriorAnswers,
) -> Result<Fragment, TemplateError> {
    let name = group.element.name();
    let mandatory = group.element.is_mandatory();
    let selected = if group.multiple {
        prior.selections(name)
    } else {
        prior.text(name).into_iter().collect()
    };

    let options = group
        .options
        .iter()
        .map(|option| {
            let checked = selected.iter().any(|value| value == option);
            json!({
                "value": option,
                "checked": checked,
                "selected": checked && group.likert,
            })
        })
        .collect::<Vec<Value>>();

    // A required checkbox means "this box must be ticked", so the group
    // carries the constraint instead of its inputs.
    let data = json!({
        "name": name,
        "question": group.element.heading(),
        "description": group.element.description(),
        "mandatory": mandatory,
        "likert": group.likert,
        "input_type": if group.multiple { "checkbox" } else { "radio" },
        "input_required": mandatory && !group.multiple,
        "group_required": mandatory && group.multiple,
        "options": options,
    });

    Ok(Fragment {
        name: name.to_string(),
        kind: FragmentKind::Question,
        control: if group.multiple {
            ControlKind::CheckboxGroup
        } else {
            ControlKind::RadioGroup
        },
        highlight_selection: group.likert,
        html: engine.render(Template::ChoiceGroup, &data)?,
    })
}

fn text_block(engine: &TemplateEngine, element: &TextElement) -> Result<Fragment, TemplateError> {
    let data = json!({
        "name": element.name,
        "title": element.title,
        "content": render_markdown(&element.description),
    });
    Ok(Fragment {
        name: element.name.clone(),
        kind: FragmentKind::Information,
        control: ControlKind::None,
        highlight_selection: false,
        html: engine.render(Template::TextBlock, &data)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::ResponseElement;
    use crate::spec::element::{AnswerType, DataValidation, LikertScale, MultiAnswer, MultipleChoice};

    fn prior(response: Value) -> PriorAnswers {
        let trial = ResponseElement::named("combined_survey")
            .with_response(response.as_object().cloned().unwrap_or_default());
        PriorAnswers::from_trials(&[trial])
    }

    fn engine() -> TemplateEngine {
        TemplateEngine::new().expect("engine")
    }

    #[test]
    fn short_answer_renders_type_bounds_and_value() {
        let element = SurveyElement::ShortAnswer(ShortAnswer {
            name: "age".into(),
            question: "How old are you?".into(),
            description: String::new(),
            mandatory: true,
            answer_type: AnswerType::Number,
            data_validation: Some(DataValidation {
                min: Some(json!(18)),
                max: Some(json!("not a number")),
            }),
        });
        let fragment =
            generate_fragment(&engine(), &element, &prior(json!({ "age": "42" }))).expect("fragment");
        assert_eq!(fragment.control, ControlKind::TextInput);
        assert!(fragment.html.contains(r#"type="number""#));
        assert!(fragment.html.contains(r#"min="18""#));
        assert!(!fragment.html.contains("max="));
        assert!(fragment.html.contains(r#"value="42""#));
        assert!(fragment.html.contains("required-mark"));
        assert!(!fragment.html.contains("question-description"));
    }

    #[test]
    fn long_answer_prefills_text_area() {
        let element = SurveyElement::LongAnswer(LongAnswer {
            name: "story".into(),
            question: "Tell us".into(),
            description: "Anything goes".into(),
            mandatory: false,
        });
        let fragment = generate_fragment(&engine(), &element, &prior(json!({ "story": "Once <upon>" })))
            .expect("fragment");
        assert_eq!(fragment.control, ControlKind::TextArea);
        assert!(fragment.html.contains("Once &lt;upon&gt;</textarea>"));
        assert!(fragment.html.contains("Anything goes"));
        assert!(!fragment.html.contains("required"));
    }

    #[test]
    fn multiple_choice_checks_stored_option() {
        let element = SurveyElement::MultipleChoice(MultipleChoice {
            name: "q2".into(),
            question: "Pick".into(),
            description: String::new(),
            mandatory: true,
            answers: vec!["A".into(), "B".into()],
        });
        let fragment =
            generate_fragment(&engine(), &element, &prior(json!({ "q2": "B" }))).expect("fragment");
        assert_eq!(fragment.control, ControlKind::RadioGroup);
        assert!(fragment.html.contains(r#"value="A" required"#));
        assert!(fragment.html.contains(r#"value="B" checked required"#));
        let a = fragment.html.find(r#"value="A""#).expect("A");
        let b = fragment.html.find(r#"value="B""#).expect("B");
        assert!(a < b);
    }

    #[test]
    fn multi_answer_checks_every_stored_member() {
        let element = SurveyElement::MultiAnswer(MultiAnswer {
            name: "pets".into(),
            question: "Pets".into(),
            description: String::new(),
            mandatory: true,
            answers: vec!["cat".into(), "dog".into(), "fish".into()],
        });
        let fragment = generate_fragment(
            &engine(),
            &element,
            &prior(json!({ "pets": ["cat", "fish"] })),
        )
        .expect("fragment");
        assert_eq!(fragment.control, ControlKind::CheckboxGroup);
        assert!(fragment.html.contains(r#"value="cat" checked"#));
        assert!(fragment.html.contains(r#"value="dog" />"#));
        assert!(fragment.html.contains(r#"value="fish" checked"#));
        assert!(fragment.html.contains(r#"data-required="true""#));
        assert!(!fragment.html.contains(" required"));
    }

    #[test]
    fn likert_marks_selection_without_inline_script() {
        let element = SurveyElement::LikertScale(LikertScale {
            name: "mood".into(),
            question: "Mood".into(),
            description: String::new(),
            mandatory: false,
            scale: vec!["low".into(), "mid".into(), "high".into()],
        });
        let fragment =
            generate_fragment(&engine(), &element, &prior(json!({ "mood": "mid" }))).expect("fragment");
        assert!(fragment.highlight_selection);
        assert!(fragment.html.contains("likert-horizontal"));
        assert!(fragment.html.contains(r#"<label class="selected"><input type="radio" name="mood" value="mid" checked"#));
        assert!(!fragment.html.contains("<script"));
        assert!(!fragment.html.contains("onclick"));
    }

    #[test]
    fn text_element_renders_markdown() {
        let element = SurveyElement::Text(TextElement {
            name: "intro".into(),
            title: "Welcome".into(),
            description: "Please read *carefully*.".into(),
            continue_button_text: None,
        });
        let fragment = fragment_for(&element, None).expect("fragment");
        assert_eq!(fragment.kind, FragmentKind::Information);
        assert_eq!(fragment.control, ControlKind::None);
        assert!(fragment.html.contains("<em>carefully</em>"));
    }

    #[test]
    fn missing_prior_leaves_controls_empty() {
        let element = SurveyElement::ShortAnswer(ShortAnswer {
            name: "q1".into(),
            question: "Name".into(),
            description: String::new(),
            mandatory: false,
            answer_type: AnswerType::Text,
            data_validation: None,
        });
        let fragment = fragment_for(&element, None).expect("fragment");
        assert!(fragment.html.contains(r#"value="""#));
    }
}
