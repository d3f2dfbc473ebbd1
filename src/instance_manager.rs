//! # OCR Instance Manager Module
//!
//! Thread-safe reuse of initialised Tesseract engines. Loading the `eng+vie`
//! traineddata takes far longer than recognising one page, so engines are
//! created once per language set and shared by every OCR call.

use leptess::LepTess;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::extract_errors::ExtractError;
use crate::ocr_config::OcrConfig;

/// Pool of Tesseract engines keyed by language configuration
///
/// # Instance Lifecycle
///
/// - Instances are created on first request for a language combination
/// - Instances are reused for subsequent requests with the same languages
/// - Instances persist until removed or the manager is dropped
///
/// Callers lock the returned engine for the duration of one recognition, so
/// two pages never share an engine concurrently.
pub struct OcrInstanceManager {
    instances: Mutex<HashMap<String, Arc<Mutex<LepTess>>>>,
}

impl OcrInstanceManager {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create an OCR engine for the configured languages
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Ocr`] if Tesseract cannot be initialised
    /// (missing traineddata for one of the languages, bad data directory).
    pub fn get_instance(&self, config: &OcrConfig) -> Result<Arc<Mutex<LepTess>>, ExtractError> {
        let key = config.languages.clone();

        {
            let instances = self.lock_instances()?;
            if let Some(instance) = instances.get(&key) {
                return Ok(Arc::clone(instance));
            }
        }

        info!(languages = %key, "Creating new OCR instance");
        let tess = LepTess::new(config.tessdata_dir.as_deref(), &key)
            .map_err(|e| ExtractError::Ocr(format!("Failed to initialize Tesseract for {key}: {e}")))?;

        let instance = Arc::new(Mutex::new(tess));

        // Another thread may have raced us here; keep whichever landed first.
        let mut instances = self.lock_instances()?;
        let stored = instances.entry(key).or_insert_with(|| Arc::clone(&instance));
        Ok(Arc::clone(stored))
    }

    fn lock_instances(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<LepTess>>>>, ExtractError> {
        self.instances
            .lock()
            .map_err(|_| ExtractError::Ocr("OCR instance pool lock poisoned".to_string()))
    }
}

impl Default for OcrInstanceManager {
    fn default() -> Self {
        Self::new()
    }
}
