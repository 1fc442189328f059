use clap::ValueEnum;

/// `--flag`, `--flag=true` or `--flag=false`.
///
/// A plain `bool` can't be combined with `num_args = 0..=1` in clap, so the
/// value goes through this enum.
#[derive(Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    True,
    False,
}

impl From<Toggle> for bool {
    fn from(value: Toggle) -> Self {
        match value {
            Toggle::True => true,
            Toggle::False => false,
        }
    }
}

impl std::fmt::Display for Toggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_possible_value()
            .expect("no values are skipped")
            .get_name()
            .fmt(f)
    }
}
