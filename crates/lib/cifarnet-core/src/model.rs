/// A marker trait for model settings. Use this to define the settings for a model. These
/// settings should be readable from a config file.
pub trait ModelSettings: Clone {}

/// A marker trait for models. Use this to define a model. A model is a struct that contains
/// a behaviour that is configured once, before training starts, from its settings.
pub trait Model {
    type Settings: ModelSettings;

    fn with_settings(settings: &Self::Settings) -> Self;
}
