use crate::registry::Grade;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Inclusive bounds of the college grading scale (1.0 is the top mark).
pub const MIN_COLLEGE_GRADE: f64 = 1.0;
pub const MAX_COLLEGE_GRADE: f64 = 4.0;

pub const NO_COLLEGE_GRADES: &str = "No college grades available";

/// Half-away-from-zero rounding to two decimals.
pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollegeAverage {
    pub average: Option<f64>,
    pub counted: usize,
    pub excluded: usize,
}

impl CollegeAverage {
    pub fn describe(&self) -> String {
        match self.average {
            Some(avg) => format!("College Average: {:.2}", avg),
            None => NO_COLLEGE_GRADES.to_string(),
        }
    }
}

/// Serialized with the rendered `text` alongside the numbers.
impl Serialize for CollegeAverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("CollegeAverage", 4)?;
        st.serialize_field("average", &self.average)?;
        st.serialize_field("counted", &self.counted)?;
        st.serialize_field("excluded", &self.excluded)?;
        st.serialize_field("text", &self.describe())?;
        st.end()
    }
}

/// Parses a grade cell; anything that is not a number on the college scale is `None`.
pub fn parse_college_grade(raw: &str) -> Option<f64> {
    let v = raw.trim().parse::<f64>().ok()?;
    if (MIN_COLLEGE_GRADE..=MAX_COLLEGE_GRADE).contains(&v) {
        Some(v)
    } else {
        None
    }
}

pub fn college_average<'a, I>(grades: I) -> CollegeAverage
where
    I: IntoIterator<Item = &'a Grade>,
{
    let mut sum = 0.0;
    let mut counted: usize = 0;
    let mut excluded: usize = 0;

    for g in grades {
        match parse_college_grade(&g.grade) {
            Some(v) => {
                sum += v;
                counted += 1;
            }
            None => excluded += 1,
        }
    }

    let average = if counted > 0 {
        Some(round_off_2_decimals(sum / counted as f64))
    } else {
        None
    };

    CollegeAverage {
        average,
        counted,
        excluded,
    }
}
