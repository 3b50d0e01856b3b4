//! Section kinds and their typed content payloads.
//!
//! A section is stored as a `(type, content)` pair. [`SectionBody`] is the
//! closed union over every kind; it serializes adjacently tagged, so it
//! flattens into the section JSON as `"type": "...", "content": {...}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Hero,
    Heading,
    Features,
    Testimonials,
    Cta,
    StaffDirectory,
    Calendar,
    Contact,
    Courses,
    Products,
    #[serde(rename = "allProducts")]
    AllProducts,
    Carousel,
    ContactForm,
    Video,
    News,
    Signin,
    Signup,
}

impl SectionKind {
    pub const ALL: [SectionKind; 17] = [
        SectionKind::Hero,
        SectionKind::Heading,
        SectionKind::Features,
        SectionKind::Testimonials,
        SectionKind::Cta,
        SectionKind::StaffDirectory,
        SectionKind::Calendar,
        SectionKind::Contact,
        SectionKind::Courses,
        SectionKind::Products,
        SectionKind::AllProducts,
        SectionKind::Carousel,
        SectionKind::ContactForm,
        SectionKind::Video,
        SectionKind::News,
        SectionKind::Signin,
        SectionKind::Signup,
    ];

    /// Tag used on the wire and in the `section_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Hero => "hero",
            SectionKind::Heading => "heading",
            SectionKind::Features => "features",
            SectionKind::Testimonials => "testimonials",
            SectionKind::Cta => "cta",
            SectionKind::StaffDirectory => "staff_directory",
            SectionKind::Calendar => "calendar",
            SectionKind::Contact => "contact",
            SectionKind::Courses => "courses",
            SectionKind::Products => "products",
            SectionKind::AllProducts => "allProducts",
            SectionKind::Carousel => "carousel",
            SectionKind::ContactForm => "contact_form",
            SectionKind::Video => "video",
            SectionKind::News => "news",
            SectionKind::Signin => "signin",
            SectionKind::Signup => "signup",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Human readable name, used when a section has no label.
    pub fn display_name(self) -> &'static str {
        match self {
            SectionKind::Hero => "Hero",
            SectionKind::Heading => "Heading",
            SectionKind::Features => "Features",
            SectionKind::Testimonials => "Testimonials",
            SectionKind::Cta => "Call to action",
            SectionKind::StaffDirectory => "Staff directory",
            SectionKind::Calendar => "Calendar",
            SectionKind::Contact => "Contact",
            SectionKind::Courses => "Courses",
            SectionKind::Products => "Products",
            SectionKind::AllProducts => "All products",
            SectionKind::Carousel => "Carousel",
            SectionKind::ContactForm => "Contact form",
            SectionKind::Video => "Video",
            SectionKind::News => "News",
            SectionKind::Signin => "Sign in",
            SectionKind::Signup => "Sign up",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Shared payload pieces
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Link to either another page of the site or an external URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    #[default]
    Left,
    Right,
    Center,
}

// ============================================================================
// Per-kind payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroContent {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub cta_text: Option<String>,
    pub cta_link: Option<LinkTarget>,
    pub background_color: Option<String>,
    pub background_image: Option<ImageRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingContent {
    pub background_color: Option<String>,
    pub background_image: Option<ImageRef>,
    pub level: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesContent {
    pub title: Option<String>,
    pub background_color: Option<String>,
    #[serde(default)]
    pub items: Vec<FeatureItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub quote: Option<String>,
    pub author: Option<String>,
    pub role: Option<String>,
    pub image: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialsContent {
    pub title: Option<String>,
    pub background_color: Option<String>,
    pub background_image: Option<ImageRef>,
    #[serde(default)]
    pub testimonials: Vec<Testimonial>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtaContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub button_text: Option<String>,
    pub button_link: Option<LinkTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub name: Option<String>,
    pub position: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffDirectoryContent {
    pub title: Option<String>,
    #[serde(default)]
    pub staff: Vec<StaffMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub date: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarContent {
    pub title: Option<String>,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactContent {
    pub text: Option<String>,
    pub src: Option<String>,
    pub alt: Option<String>,
    pub caption: Option<String>,
}

/// One course or product card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub price: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowAllButton {
    pub show: Option<bool>,
    pub text: Option<String>,
    pub link: Option<String>,
}

/// Shared by `courses` and `products`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursesContent {
    pub title: Option<String>,
    #[serde(default)]
    pub courses: Vec<CatalogItem>,
    pub show_all_button: Option<ShowAllButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllProductsContent {
    pub title: Option<String>,
    #[serde(default)]
    pub products: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselButton {
    pub text: Option<String>,
    pub link: Option<String>,
    pub page_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarouselSlide {
    pub title: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub buttons: Vec<CarouselButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselContent {
    pub background_color: Option<String>,
    /// Older editors send the misspelt `textPostion`.
    #[serde(default, alias = "textPostion")]
    pub text_position: TextPosition,
    #[serde(default)]
    pub items: Vec<CarouselSlide>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFormContent {
    pub background_color: Option<String>,
    pub background_image: Option<ImageRef>,
    #[serde(default)]
    pub text_position: TextPosition,
    pub image: Option<ImageRef>,
    pub title: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub button_text: Option<String>,
    pub button_link: Option<LinkTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoContent {
    pub background_color: Option<String>,
    pub background_image: Option<ImageRef>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub text_position: TextPosition,
    pub video: Option<String>,
}

/// Kinds whose payload has no fixed shape.
pub type FreeformContent = Map<String, Value>;

// ============================================================================
// The union
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum SectionBody {
    Hero(HeroContent),
    Heading(HeadingContent),
    Features(FeaturesContent),
    Testimonials(TestimonialsContent),
    Cta(CtaContent),
    StaffDirectory(StaffDirectoryContent),
    Calendar(CalendarContent),
    Contact(ContactContent),
    Courses(CoursesContent),
    Products(CoursesContent),
    #[serde(rename = "allProducts")]
    AllProducts(AllProductsContent),
    Carousel(CarouselContent),
    ContactForm(ContactFormContent),
    Video(VideoContent),
    News(FreeformContent),
    Signin(FreeformContent),
    Signup(FreeformContent),
}

impl SectionBody {
    /// Validate a raw `(type, content)` pair into a typed body.
    pub fn from_parts(kind: SectionKind, content: Value) -> AppResult<Self> {
        if !content.is_object() {
            return Err(AppError::validation(format!(
                "Invalid content structure for section type {kind}: content must be an object"
            )));
        }

        let tagged = serde_json::json!({ "type": kind.as_str(), "content": content });
        let body: SectionBody = serde_json::from_value(tagged).map_err(|e| {
            AppError::validation(format!(
                "Invalid content structure for section type {kind}: {e}"
            ))
        })?;

        body.check()?;
        Ok(body)
    }

    pub fn kind(&self) -> SectionKind {
        match self {
            SectionBody::Hero(_) => SectionKind::Hero,
            SectionBody::Heading(_) => SectionKind::Heading,
            SectionBody::Features(_) => SectionKind::Features,
            SectionBody::Testimonials(_) => SectionKind::Testimonials,
            SectionBody::Cta(_) => SectionKind::Cta,
            SectionBody::StaffDirectory(_) => SectionKind::StaffDirectory,
            SectionBody::Calendar(_) => SectionKind::Calendar,
            SectionBody::Contact(_) => SectionKind::Contact,
            SectionBody::Courses(_) => SectionKind::Courses,
            SectionBody::Products(_) => SectionKind::Products,
            SectionBody::AllProducts(_) => SectionKind::AllProducts,
            SectionBody::Carousel(_) => SectionKind::Carousel,
            SectionBody::ContactForm(_) => SectionKind::ContactForm,
            SectionBody::Video(_) => SectionKind::Video,
            SectionBody::News(_) => SectionKind::News,
            SectionBody::Signin(_) => SectionKind::Signin,
            SectionBody::Signup(_) => SectionKind::Signup,
        }
    }

    /// The `content` half of the pair, as stored in the JSONB column.
    pub fn content_json(&self) -> Value {
        let tagged = serde_json::to_value(self).unwrap_or(Value::Null);
        match tagged {
            Value::Object(mut map) => map.remove("content").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Rules the field types alone cannot express.
    fn check(&self) -> AppResult<()> {
        if let SectionBody::Heading(HeadingContent {
            level: Some(level), ..
        }) = self
        {
            if !(1..=6).contains(level) {
                return Err(AppError::validation(format!(
                    "Heading level must be between 1 and 6, got {level}"
                )));
            }
        }

        if let SectionBody::Testimonials(content) = self {
            if content
                .testimonials
                .iter()
                .filter_map(|t| t.rating)
                .any(|rating| !(0.0..=5.0).contains(&rating))
            {
                return Err(AppError::validation("Testimonial rating must be between 0 and 5"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in SectionKind::ALL {
            assert_eq!(SectionKind::parse(kind.as_str()), Some(kind));
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, json!(kind.as_str()));
        }
        assert_eq!(SectionKind::parse("paragraph"), None);
    }

    #[test]
    fn test_hero_payload_is_typed() {
        let body = SectionBody::from_parts(
            SectionKind::Hero,
            json!({
                "title": "Welcome",
                "ctaText": "Enroll",
                "ctaLink": { "pageId": "abc", "link": "/apply" },
                "backgroundImage": { "hide": false, "src": "/a.png" }
            }),
        )
        .unwrap();

        match &body {
            SectionBody::Hero(hero) => {
                assert_eq!(hero.title.as_deref(), Some("Welcome"));
                assert_eq!(
                    hero.cta_link.as_ref().and_then(|l| l.link.as_deref()),
                    Some("/apply")
                );
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(body.kind(), SectionKind::Hero);
        assert_eq!(body.content_json()["ctaText"], "Enroll");
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let err = SectionBody::from_parts(SectionKind::Hero, json!({ "title": 42 })).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("hero"));
    }

    #[test]
    fn test_content_must_be_object() {
        let err = SectionBody::from_parts(SectionKind::Cta, json!("just text")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(SectionBody::from_parts(SectionKind::Cta, Value::Null).is_err());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let body =
            SectionBody::from_parts(SectionKind::Cta, json!({ "title": "Go", "extra": true })).unwrap();
        assert_eq!(body.content_json(), json!({
            "title": "Go",
            "description": null,
            "buttonText": null,
            "buttonLink": null
        }));
    }

    #[test]
    fn test_heading_level_bounds() {
        assert!(SectionBody::from_parts(SectionKind::Heading, json!({ "level": 2 })).is_ok());
        assert!(SectionBody::from_parts(SectionKind::Heading, json!({ "level": 9 })).is_err());
    }

    #[test]
    fn test_testimonial_rating_bounds() {
        let ok = json!({ "testimonials": [{ "quote": "Great", "rating": 5 }] });
        assert!(SectionBody::from_parts(SectionKind::Testimonials, ok).is_ok());

        let bad = json!({ "testimonials": [{ "quote": "Great", "rating": 11 }] });
        assert!(SectionBody::from_parts(SectionKind::Testimonials, bad).is_err());
    }

    #[test]
    fn test_text_position_enum_and_alias() {
        let body = SectionBody::from_parts(
            SectionKind::Carousel,
            json!({ "textPostion": "right", "items": [{ "title": "Slide", "descriptions": ["a"] }] }),
        )
        .unwrap();
        match body {
            SectionBody::Carousel(carousel) => {
                assert_eq!(carousel.text_position, TextPosition::Right);
                assert_eq!(carousel.items.len(), 1);
            }
            other => panic!("unexpected body {other:?}"),
        }

        let err = SectionBody::from_parts(SectionKind::Video, json!({ "textPosition": "top" }));
        assert!(err.is_err());
    }

    #[test]
    fn test_products_share_course_schema() {
        let body = SectionBody::from_parts(
            SectionKind::Products,
            json!({ "title": "Shop", "courses": [{ "name": "Uniform", "price": "20" }] }),
        )
        .unwrap();
        assert_eq!(body.kind(), SectionKind::Products);

        let all = SectionBody::from_parts(
            SectionKind::AllProducts,
            json!({ "products": [{ "name": "Bag" }] }),
        )
        .unwrap();
        assert_eq!(all.kind(), SectionKind::AllProducts);
        assert_eq!(serde_json::to_value(&all).unwrap()["type"], "allProducts");
    }

    #[test]
    fn test_freeform_kinds_keep_payload() {
        let payload = json!({ "headline": "Open day", "items": [1, 2, 3] });
        let body = SectionBody::from_parts(SectionKind::News, payload.clone()).unwrap();
        assert_eq!(body.content_json(), payload);
    }
}
