use std::path::{Path, PathBuf};

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const MODEL_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin";
const MODEL_FILENAME: &str = "ggml-base.en.bin";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where the English whisper model lives on disk.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl Default for ModelStore {
    /// `<data_dir>/interview-sim/models/`
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::at(base.join("interview-sim").join("models"))
    }
}

impl ModelStore {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILENAME)
    }

    fn partial_path(&self) -> PathBuf {
        self.dir.join(format!("{MODEL_FILENAME}.part"))
    }

    pub fn is_present(&self) -> bool {
        self.model_path().is_file()
    }

    /// Stream the model into `<name>.part` and rename it once complete, so
    /// an interrupted download is never mistaken for a model.
    /// `on_progress(received, total)`; total is 0 when unknown.
    pub async fn download<F>(&self, on_progress: F) -> Result<(), BoxError>
    where
        F: Fn(u64, u64) + Send + 'static,
    {
        use futures_util::StreamExt;
        use tokio::io::AsyncWriteExt;

        tokio::fs::create_dir_all(&self.dir).await?;

        let response = reqwest::get(MODEL_URL).await?.error_for_status()?;
        let total = response.content_length().unwrap_or(0);
        let partial = self.partial_path();
        let mut out = tokio::fs::File::create(&partial).await?;

        let mut received = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            received += chunk.len() as u64;
            on_progress(received, total);
        }
        out.flush().await?;
        drop(out);

        let target = self.model_path();
        tokio::fs::rename(&partial, &target).await?;
        log::info!("Speech model saved to {}", target.display());
        Ok(())
    }

    /// Blocking; whisper parses the whole file.
    pub fn load(&self) -> Result<WhisperContext, BoxError> {
        load_from(&self.model_path())
    }

    /// Download on first use, then load off the async threads.
    pub async fn ensure(&self) -> Result<WhisperContext, BoxError> {
        if !self.is_present() {
            log::info!("No speech model at {}, downloading", self.model_path().display());
            self.download(|received, total| {
                if total > 0 && received == total {
                    log::info!("Speech model download complete ({:.1} MB)", total as f64 / 1_048_576.0);
                } else {
                    log::trace!("Speech model: {received} / {total} bytes");
                }
            })
            .await?;
        }
        let path = self.model_path();
        tokio::task::spawn_blocking(move || load_from(&path))
            .await
            .map_err(|e| format!("Speech model loader panicked: {e}"))?
    }
}

fn load_from(path: &Path) -> Result<WhisperContext, BoxError> {
    let path = path.to_str().ok_or("Speech model path is not valid UTF-8")?;
    let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
        .map_err(|e| format!("Could not load speech model: {e}"))?;
    log::info!("Speech model loaded");
    Ok(ctx)
}

/// Greedy English decoding of one utterance as a single segment.
fn decode_params<'a, 'b>() -> FullParams<'a, 'b> {
    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some("en"));
    params.set_single_segment(true);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_n_threads(
        std::thread::available_parallelism()
            .map(|n| n.get() as i32)
            .unwrap_or(4),
    );
    params
}

/// Transcribe one utterance of 16 kHz mono samples. CPU-bound.
pub fn transcribe(ctx: &WhisperContext, samples: &[f32]) -> Result<String, BoxError> {
    let mut state = ctx
        .create_state()
        .map_err(|e| format!("Could not create recognizer state: {e}"))?;
    state
        .full(decode_params(), samples)
        .map_err(|e| format!("Recognition failed: {e}"))?;

    let raw: Vec<String> = state.as_iter().map(|segment| segment.to_string()).collect();
    Ok(clean_transcript(&raw.join(" ")))
}

/// Collapse whitespace and drop whisper's non-speech markers such as
/// `[BLANK_AUDIO]`, `[Music]` or `(coughs)`. Brackets that belong to the
/// answer itself, like `f(x)` or `arr[0]`, are kept.
pub fn clean_transcript(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        match marker_end(&chars, i) {
            Some(end) => {
                out.push(' ');
                i = end + 1;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Index of the closing bracket if a standalone marker starts at `start`.
/// `[..]` markers are letters, spaces and underscores with at least three
/// letters; `(..)` markers are lower-case words of three letters or more.
fn marker_end(chars: &[char], start: usize) -> Option<usize> {
    let close = match chars[start] {
        '[' => ']',
        '(' => ')',
        _ => return None,
    };
    if start > 0 && !chars[start - 1].is_whitespace() {
        return None;
    }
    let len = chars[start + 1..].iter().position(|&c| c == close)?;
    let end = start + 1 + len;
    if chars.get(end + 1).is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }

    let inner = &chars[start + 1..end];
    let is_marker = match close {
        ']' => {
            inner
                .iter()
                .all(|c| c.is_ascii_alphabetic() || *c == '_' || *c == ' ')
                && inner.iter().filter(|c| c.is_ascii_alphabetic()).count() >= 3
        }
        _ => {
            let text: String = inner.iter().collect();
            let mut words = text.split_whitespace().peekable();
            words.peek().is_some()
                && words.all(|w| w.len() >= 3 && w.chars().all(|c| c.is_ascii_lowercase()))
        }
    };
    is_marker.then_some(end)
}
