use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Upload progress on stderr, or nothing when disabled
pub struct UploadProgress {
    bar: ProgressBar,
}

impl UploadProgress {
    pub fn new(total_bytes: u64, visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(total_bytes), target);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("Uploading [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }

        Self { bar }
    }

    pub fn update(&self, sent_bytes: u64) {
        self.bar.set_position(sent_bytes);
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    /// Leave the bar where it stopped
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_tracks_position() {
        let progress = UploadProgress::new(3000, false);
        progress.update(1460);
        assert_eq!(progress.bar.position(), 1460);
        progress.update(3000);
        progress.finish();
        assert!(progress.bar.is_finished());
    }
}
