use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Total / successes / failures bars for a batch of `len` units.
///
/// Every bar is hidden when `tui` is off, so callers tick them unconditionally.
pub(crate) struct Progress {
    _multi: Option<MultiProgress>,
    total: ProgressBar,
    success: ProgressBar,
    fails: ProgressBar,
}

impl Progress {
    pub(crate) fn new(len: usize, label: &str, tui: bool) -> Self {
        if !tui {
            return Self {
                _multi: None,
                total: ProgressBar::hidden(),
                success: ProgressBar::hidden(),
                fails: ProgressBar::hidden(),
            };
        }

        let multi = MultiProgress::new();

        // total number of units in the batch
        let total = multi.add(ProgressBar::new(len as u64).with_style(
            style(
                "{spinner:.magenta}\n \
                    {msg:>9.white} |{bar:57.white/grey}| {pos:<2} / {human_len} \
                    ({percent_precise}%) [Time: {elapsed}, Rate: {per_sec}, ETA: {eta}]",
            ),
        ));
        total.set_message(label.to_string());
        total.enable_steady_tick(Duration::from_millis(100));

        let success = multi.insert_after(
            &total,
            ProgressBar::new(len as u64)
                .with_style(style(" {msg:>9.green} |{bar:57.green}| {pos:<2.green}")),
        );
        success.set_message("successes");

        let fails = multi.insert_after(
            &success,
            ProgressBar::new(len as u64)
                .with_style(style(" {msg:>9.red} |{bar:57.red}| {pos:<2.red}")),
        );
        fails.set_message("failures");

        Self {
            _multi: Some(multi),
            total,
            success,
            fails,
        }
    }

    pub(crate) fn succeed(&self) {
        self.success.inc(1);
        self.total.inc(1);
    }

    pub(crate) fn fail(&self) {
        self.fails.inc(1);
        self.total.inc(1);
    }

    /// Counted in the total only.
    pub(crate) fn skip(&self) {
        self.total.inc(1);
    }

    pub(crate) fn finish(&self) {
        self.total.finish();
        self.success.finish();
        self.fails.finish();
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("## ")
}
