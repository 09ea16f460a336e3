//! Request fixtures for E2E testing

/// An image request and what the submission should do with it.
#[derive(Debug, Clone)]
pub struct ImageRequestFixture {
    pub body: &'static str,
    pub accepted: bool,
    pub description: &'static str,
}

pub const IMAGE_REQUESTS: &[ImageRequestFixture] = &[
    ImageRequestFixture {
        body: r#"{"prompt": "a red cube", "width": 512, "height": 512}"#,
        accepted: true,
        description: "square render",
    },
    ImageRequestFixture {
        body: r#"{"prompt": "a red cube"}"#,
        accepted: true,
        description: "defaults only",
    },
    ImageRequestFixture {
        body: r#"{"prompt": "a red cube", "width": -512, "height": 512}"#,
        accepted: false,
        description: "negative width",
    },
    ImageRequestFixture {
        body: r#"{"prompt": "a red cube", "width": 8192, "height": 512}"#,
        accepted: false,
        description: "width above maximum",
    },
    ImageRequestFixture {
        body: r#"{"prompt": "a red cube", "width": 500, "height": 512}"#,
        accepted: false,
        description: "width not a multiple of 8",
    },
    ImageRequestFixture {
        body: r#"{"prompt": "   "}"#,
        accepted: false,
        description: "blank prompt",
    },
    ImageRequestFixture {
        body: r#"{"prompt": "a red cube", "steps": 0}"#,
        accepted: false,
        description: "zero steps",
    },
];
