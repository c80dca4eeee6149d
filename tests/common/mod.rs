//! Shared WXR fixture builders for the integration tests.

#![allow(dead_code)]

/// One `<item>` of an export.
pub struct Item {
    pub post_id: String,
    pub title: String,
    pub creator: String,
    pub content: String,
    pub post_name: String,
    pub post_date_gmt: String,
    pub status: String,
    pub post_type: String,
    pub guid: String,
    /// `(domain, name)` pairs.
    pub terms: Vec<(String, String)>,
    pub thumbnail_id: Option<String>,
}

impl Item {
    pub fn post(post_id: &str, title: &str) -> Self {
        Self {
            post_id: post_id.to_string(),
            title: title.to_string(),
            creator: "gomix".to_string(),
            content: "<p>Hello.</p>".to_string(),
            post_name: format!("post-{}", post_id),
            post_date_gmt: "2023-04-01 09:30:00".to_string(),
            status: "publish".to_string(),
            post_type: "post".to_string(),
            guid: format!("https://blog.example.com/?p={}", post_id),
            terms: Vec::new(),
            thumbnail_id: None,
        }
    }

    pub fn attachment(post_id: &str, url: &str) -> Self {
        Self {
            post_type: "attachment".to_string(),
            status: "inherit".to_string(),
            guid: url.to_string(),
            content: String::new(),
            ..Self::post(post_id, "attachment")
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn post_type(mut self, post_type: &str) -> Self {
        self.post_type = post_type.to_string();
        self
    }

    pub fn content(mut self, html: &str) -> Self {
        self.content = html.to_string();
        self
    }

    pub fn date(mut self, gmt: &str) -> Self {
        self.post_date_gmt = gmt.to_string();
        self
    }

    pub fn category(mut self, name: &str) -> Self {
        self.terms.push(("category".to_string(), name.to_string()));
        self
    }

    pub fn tag(mut self, name: &str) -> Self {
        self.terms.push(("post_tag".to_string(), name.to_string()));
        self
    }

    pub fn thumbnail(mut self, attachment_id: &str) -> Self {
        self.thumbnail_id = Some(attachment_id.to_string());
        self
    }

    fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<item>\n");
        xml.push_str(&format!("<title>{}</title>\n", self.title));
        xml.push_str(&format!("<guid isPermaLink=\"false\">{}</guid>\n", self.guid));
        xml.push_str(&format!("<dc:creator><![CDATA[{}]]></dc:creator>\n", self.creator));
        xml.push_str(&format!(
            "<content:encoded><![CDATA[{}]]></content:encoded>\n",
            self.content
        ));
        xml.push_str("<excerpt:encoded><![CDATA[]]></excerpt:encoded>\n");
        xml.push_str(&format!("<wp:post_id>{}</wp:post_id>\n", self.post_id));
        xml.push_str(&format!(
            "<wp:post_date><![CDATA[{}]]></wp:post_date>\n",
            self.post_date_gmt
        ));
        xml.push_str(&format!(
            "<wp:post_date_gmt><![CDATA[{}]]></wp:post_date_gmt>\n",
            self.post_date_gmt
        ));
        xml.push_str(&format!(
            "<wp:post_name><![CDATA[{}]]></wp:post_name>\n",
            self.post_name
        ));
        xml.push_str(&format!("<wp:status><![CDATA[{}]]></wp:status>\n", self.status));
        xml.push_str(&format!(
            "<wp:post_type><![CDATA[{}]]></wp:post_type>\n",
            self.post_type
        ));
        for (domain, name) in &self.terms {
            xml.push_str(&format!(
                "<category domain=\"{}\" nicename=\"{}\"><![CDATA[{}]]></category>\n",
                domain,
                name.to_lowercase(),
                name
            ));
        }
        if let Some(id) = &self.thumbnail_id {
            xml.push_str(&format!(
                "<wp:postmeta><wp:meta_key><![CDATA[_thumbnail_id]]></wp:meta_key>\
                 <wp:meta_value><![CDATA[{}]]></wp:meta_value></wp:postmeta>\n",
                id
            ));
        }
        xml.push_str("</item>\n");
        xml
    }
}

/// A full export for `site`: author `gomix` (ID 1), categories Tech (5) and
/// Life (6), tag Rust (9), plus `items`.
pub fn export_xml(site: &str, items: &[Item]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<rss version="2.0"
    xmlns:excerpt="http://wordpress.org/export/1.2/excerpt/"
    xmlns:content="http://purl.org/rss/1.0/modules/content/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
<title>Test Blog</title>
<link>{site}</link>
<wp:base_site_url>{site}</wp:base_site_url>
<wp:author><wp:author_id>1</wp:author_id><wp:author_login><![CDATA[gomix]]></wp:author_login></wp:author>
<wp:category><wp:term_id>5</wp:term_id><wp:category_nicename><![CDATA[tech]]></wp:category_nicename><wp:cat_name><![CDATA[Tech]]></wp:cat_name></wp:category>
<wp:category><wp:term_id>6</wp:term_id><wp:category_nicename><![CDATA[%e6%97%a5%e5%b8%b8]]></wp:category_nicename><wp:cat_name><![CDATA[Life]]></wp:cat_name></wp:category>
<wp:tag><wp:term_id>9</wp:term_id><wp:tag_slug><![CDATA[rust]]></wp:tag_slug><wp:tag_name><![CDATA[Rust]]></wp:tag_name></wp:tag>
"#
    );
    for item in items {
        xml.push_str(&item.to_xml());
    }
    xml.push_str("</channel>\n</rss>\n");
    xml
}
