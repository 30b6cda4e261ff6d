/// Integration tests for the conversion worker.
///
/// These tests drive the public API end to end: text files are wrapped,
/// paginated, rendered and rasterized with the real resvg backend, and jobs
/// flow through the queue engine. OCR uses a scripted engine so tesseract is
/// not required.
///
/// ## Running Tests
///
/// ```bash
/// cargo test --test conversion_test
/// ```

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use seedoc_worker::{
        converter::{DocumentConverter, JobOutcome},
        error::ConvertError,
        job::JobStatus,
        ocr::{OcrEngine, ProgressSink},
        paginate::PageLayout,
        queue::{QueueConfig, QueueEngine},
        raster::ResvgRasterizer,
        settings::{OutputFormat, RenderSettings},
    };
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct ScriptedOcr;

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn recognize(
            &self,
            _image_path: &Path,
            language: &str,
            progress: &dyn ProgressSink,
        ) -> Result<String, ConvertError> {
            progress.report(100);
            Ok(format!("# recognized ({})\n", language))
        }
    }

    fn converter() -> DocumentConverter {
        // No fonts: glyphs are skipped but geometry and encoding are exercised.
        let raster = ResvgRasterizer::with_fonts(usvg::fontdb::Database::new());
        DocumentConverter::new(Arc::new(raster), Arc::new(ScriptedOcr))
    }

    fn engine() -> QueueEngine {
        QueueEngine::new(
            converter(),
            RenderSettings::default(),
            QueueConfig {
                prune_delay: Duration::from_secs(600),
            },
        )
    }

    /// Text file to a single PNG page with the computed geometry.
    #[tokio::test]
    async fn test_text_to_png_page() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, "line one\nline two").unwrap();

        let settings = RenderSettings::new(90, 200, OutputFormat::Png);
        let result = converter()
            .convert_text_file(&source, &settings)
            .await
            .unwrap();

        assert_eq!(result.total_pages, 1);
        let page = &result.output_files[0];
        assert_eq!(page.path, dir.path().join("notes.png"));
        assert_eq!(page.lines, 9);
        assert_eq!(page.size_bytes, std::fs::metadata(&page.path).unwrap().len());

        let decoded = image::open(&page.path).unwrap();
        assert_eq!(decoded.width(), 1800);
        assert_eq!(decoded.height(), PageLayout::default().page_height(9));
    }

    /// An empty source still produces one page holding the banner.
    #[tokio::test]
    async fn test_empty_file_yields_one_page() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("empty.log");
        std::fs::write(&source, "").unwrap();

        let result = converter()
            .convert_text_file(&source, &RenderSettings::default())
            .await
            .unwrap();

        assert_eq!(result.total_pages, 1);
        assert_eq!(result.output_files[0].lines, 8);
        assert!(dir.path().join("empty.jpg").exists());
    }

    /// Control bytes and markup characters never break rendering.
    #[tokio::test]
    async fn test_hostile_bytes_render() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("weird.txt");
        std::fs::write(&source, b"<tag> & \"quote\" \x07 bell \x00 \xff").unwrap();

        let result = converter()
            .convert_text_file(&source, &RenderSettings::new(80, 200, OutputFormat::Tiff))
            .await
            .unwrap();

        assert_eq!(result.output_files[0].path, dir.path().join("weird.tiff"));
        assert!(result.total_size_bytes > 0);
    }

    /// Page count follows the layout for long inputs.
    #[tokio::test]
    async fn test_multi_page_names() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("long.md");
        // 7 banner lines + 14 body lines over 10 lines per page
        let body: Vec<String> = (0..14).map(|i| format!("row {}", i)).collect();
        std::fs::write(&source, body.join("\n")).unwrap();

        let layout = PageLayout {
            max_height: 80 + 40 + 36 * 10,
            ..PageLayout::default()
        };
        let timestamp = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let result = converter()
            .with_layout(layout)
            .convert_text_file_at(&source, &RenderSettings::default(), timestamp)
            .await
            .unwrap();

        let names: Vec<String> = result
            .output_files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["long_001.jpg", "long_002.jpg", "long_003.jpg"]);
        let lines: Vec<usize> = result.output_files.iter().map(|f| f.lines).collect();
        assert_eq!(lines, vec![10, 10, 1]);
    }

    /// Three jobs where the middle one fails: the queue keeps going.
    #[tokio::test]
    async fn test_queue_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.txt");
        let third = dir.path().join("third.png");
        std::fs::write(&first, "hello").unwrap();
        std::fs::write(&third, b"fake image").unwrap();

        let engine = engine();
        engine.enqueue(vec![first, dir.path().join("missing.txt"), third]);
        tokio::time::timeout(Duration::from_secs(30), engine.wait_idle())
            .await
            .unwrap();

        let jobs = engine.snapshot();
        let statuses: Vec<JobStatus> = jobs.iter().map(|j| j.status).collect();
        assert_eq!(
            statuses,
            vec![JobStatus::Completed, JobStatus::Error, JobStatus::Completed]
        );
        assert!(jobs[1].error.is_some());
        assert!(dir.path().join("first.jpg").exists());

        let ocr_files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("ocr_third_") && name.ends_with(".md"))
            .collect();
        assert_eq!(ocr_files.len(), 1);
        let text = std::fs::read_to_string(dir.path().join(&ocr_files[0])).unwrap();
        assert_eq!(text, "# recognized (kor+eng)\n");
    }

    /// Output folder override and reset between jobs.
    #[tokio::test]
    async fn test_output_folder_override_and_reset() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let a = src.path().join("a.txt");
        let b = src.path().join("b.txt");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        let engine = engine();
        let mut events = engine.subscribe();

        engine.set_output_dir(Some(out.path().to_path_buf()));
        engine.enqueue(vec![a]);
        engine.wait_idle().await;

        engine.set_output_dir(None);
        engine.enqueue(vec![b]);
        engine.wait_idle().await;

        assert!(out.path().join("a.jpg").exists());
        assert!(src.path().join("b.jpg").exists());
        assert!(!src.path().join("a.jpg").exists());

        let mut outcomes = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let seedoc_worker::queue::QueueEvent::JobFinished {
                outcome: Some(JobOutcome::Pages(result)),
                ..
            } = event
            {
                outcomes.push(result.output_files[0].path.clone());
            }
        }
        assert_eq!(
            outcomes,
            vec![out.path().join("a.jpg"), src.path().join("b.jpg")]
        );
    }
}
