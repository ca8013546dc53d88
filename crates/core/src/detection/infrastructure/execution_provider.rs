use ort::execution_providers::ExecutionProviderDispatch;

/// Hardware-accelerated providers to try before ONNX Runtime's CPU fallback.
///
/// Shared by the detection and embedding sessions.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    #[test]
    fn test_no_accelerated_provider_on_other_platforms() {
        assert!(preferred_execution_providers().is_empty());
    }

    #[cfg(any(target_os = "macos", target_os = "windows"))]
    #[test]
    fn test_one_accelerated_provider_on_desktop_platforms() {
        assert_eq!(preferred_execution_providers().len(), 1);
    }
}
