use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

use crate::config::DEFAULT_LOCALES_DIR;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "vi"];

/// Localization manager for the bot's user-facing messages
pub struct LocalizationManager {
    bundles: HashMap<&'static str, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Load `<dir>/<lang>/main.ftl` for every supported language.
    ///
    /// A missing or unparsable resource leaves that language empty; lookups
    /// then fall back to English.
    pub fn load(dir: &Path) -> Self {
        let mut bundles = HashMap::new();

        for language in SUPPORTED_LANGUAGES {
            match Self::create_bundle(dir, language) {
                Some(bundle) => {
                    bundles.insert(language, bundle);
                }
                None => warn!(language, dir = %dir.display(), "No usable locale resource"),
            }
        }

        Self { bundles }
    }

    fn create_bundle(dir: &Path, language: &str) -> Option<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = language.parse().ok()?;
        let resource_path: PathBuf = dir.join(language).join("main.ftl");
        let content = fs::read_to_string(&resource_path).ok()?;

        let resource = match FluentResource::try_new(content) {
            Ok(resource) => resource,
            Err((resource, errors)) => {
                warn!(
                    path = %resource_path.display(),
                    errors = errors.len(),
                    "Locale resource has syntax errors, keeping valid entries"
                );
                resource
            }
        };

        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Unicode isolation marks would end up verbatim in chat messages
        bundle.set_use_isolating(false);
        bundle.add_resource(resource).ok()?;
        Some(bundle)
    }

    /// Map a platform language code ("vi", "vi-VN", "en-US", ...) to a supported language
    pub fn resolve_language(code: Option<&str>) -> &'static str {
        let primary = code
            .and_then(|c| c.split(['-', '_']).next())
            .map(str::to_ascii_lowercase);

        SUPPORTED_LANGUAGES
            .into_iter()
            .find(|lang| primary.as_deref() == Some(*lang))
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Get a localized message in a specific language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let language = Self::resolve_language(Some(language));

        self.format(language, key, args)
            .or_else(|| {
                if language != DEFAULT_LANGUAGE {
                    debug!(key, language, "Falling back to default language");
                    self.format(DEFAULT_LANGUAGE, key, args)
                } else {
                    None
                }
            })
            .unwrap_or_else(|| format!("Missing translation: {key}"))
    }

    fn format(&self, language: &str, key: &str, args: Option<&HashMap<&str, &str>>) -> Option<String> {
        let bundle = self.bundles.get(language)?;
        let pattern = bundle.get_message(key)?.value()?;

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, *value);
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            debug!(key, errors = ?errors, "Message formatted with errors");
        }
        Some(value.into_owned())
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Load the global localization manager from `dir`.
///
/// Returns `false` if it was already initialised.
pub fn init_localization(dir: &Path) -> bool {
    let mut loaded = false;
    LOCALIZATION_MANAGER.get_or_init(|| {
        loaded = true;
        LocalizationManager::load(dir)
    });
    loaded
}

/// Get the global localization manager, loading the default directory on first use
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| LocalizationManager::load(Path::new(DEFAULT_LOCALES_DIR)))
}

/// Localized message for the user's language code
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    let language = LocalizationManager::resolve_language(language_code);
    get_localization_manager().get_message_in_language(key, language, None)
}

/// Localized message with arguments for the user's language code
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let language = LocalizationManager::resolve_language(language_code);
    let args_map: HashMap<&str, &str> = args.iter().copied().collect();
    get_localization_manager().get_message_in_language(key, language, Some(&args_map))
}
