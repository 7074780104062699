use serde::{Deserialize, Serialize};
use std::fmt;

/// Named collections in the hosted document store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Students,
    Teachers,
    Admins,
    Homework,
    Materials,
    Notices,
    Questions,
    Feedback,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Students,
        Collection::Teachers,
        Collection::Admins,
        Collection::Homework,
        Collection::Materials,
        Collection::Notices,
        Collection::Questions,
        Collection::Feedback,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Teachers => "teachers",
            Collection::Admins => "admins",
            Collection::Homework => "homework",
            Collection::Materials => "materials",
            Collection::Notices => "notices",
            Collection::Questions => "questions",
            Collection::Feedback => "feedback",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
