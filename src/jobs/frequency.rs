use std::fmt;
use std::str::FromStr;

/// Recurrence cadence of a fee structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Monthly,
    Bimonthly,
    Quarterly,
    Semiannually,
}

impl Frequency {
    /// Cadences are aligned to calendar months counted from January, not to
    /// the structure's creation date. `month0` is 0 for January.
    pub fn is_due(self, month0: u32) -> bool {
        match self {
            Frequency::Monthly => true,
            Frequency::Bimonthly => month0 % 2 == 0,
            Frequency::Quarterly => month0 % 3 == 0,
            Frequency::Semiannually => month0 % 6 == 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Bimonthly => "bimonthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Semiannually => "semiannually",
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Frequency::Monthly),
            "bimonthly" => Ok(Frequency::Bimonthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "semiannually" => Ok(Frequency::Semiannually),
            other => Err(format!("unrecognized frequency '{}'", other)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a structure with `frequency` materializes in `month0`.
/// Unrecognized frequencies never do.
pub fn should_create(frequency: &str, month0: u32) -> bool {
    frequency
        .parse::<Frequency>()
        .map(|f| f.is_due(month0))
        .unwrap_or(false)
}
