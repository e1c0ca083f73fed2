pub mod element;
pub mod settings;

pub use element::{
    AnswerType, DataValidation, LikertScale, LongAnswer, MultiAnswer, MultipleChoice, ShortAnswer,
    SurveyElement, SurveyEntry, TextElement,
};
pub use settings::{
    AppSettings, FullScreenSettings, NextStepSettings, PageButtonSettings, SurveySettings,
};
