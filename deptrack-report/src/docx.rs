//! Minimal WordprocessingML (`.docx`) writer and reader.
//!
//! Output is deterministic: parts are written in a fixed order, every zip
//! entry carries the same timestamp, and the only date in the package is the
//! document's own `created` value.

use std::io::{Cursor, Read, Write};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::branding::BrandingImage;
use crate::document::{Align, Block, Document, Paragraph, Run};
use crate::error::DocxError;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const DOCUMENT_PART: &str = "word/document.xml";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Half an inch, in twentieths of a point.
const INDENT_STEP: u32 = 720;

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).unwrap_or_default())
}

/// Escape text for element content or attribute values. Control characters
/// other than tab/newline are not legal XML 1.0 and are dropped.
pub fn escape_xml(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| (*c as u32) >= 0x20 || matches!(c, '\t' | '\n' | '\r'))
        .collect();
    escape(cleaned.as_str()).into_owned()
}

/// Serialize a document into a `.docx` package held in memory.
pub fn write_docx(doc: &Document) -> Result<Vec<u8>, DocxError> {
    let image = doc.blocks.iter().find_map(|b| match b {
        Block::Image(img) => Some(img),
        Block::Paragraph(_) => None,
    });

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    part(&mut zip, "[Content_Types].xml", content_types(image).as_bytes())?;
    part(&mut zip, "_rels/.rels", package_rels().as_bytes())?;
    part(&mut zip, "docProps/core.xml", core_props(doc).as_bytes())?;
    part(&mut zip, "word/_rels/document.xml.rels", document_rels(image).as_bytes())?;
    part(&mut zip, DOCUMENT_PART, document_xml(doc).as_bytes())?;
    part(&mut zip, "word/footer1.xml", footer_xml().as_bytes())?;
    if let Some(img) = image {
        part(&mut zip, &format!("word/media/{}", img.part_name()), &img.bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

fn part(zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, body: &[u8]) -> Result<(), DocxError> {
    zip.start_file(name, entry_options())?;
    zip.write_all(body)?;
    Ok(())
}

fn content_types(image: Option<&BrandingImage>) -> String {
    let mut s = String::from(XML_DECL);
    s.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    s.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    s.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    if let Some(img) = image {
        s.push_str(&format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            img.format.extension(),
            img.format.content_type()
        ));
    }
    s.push_str(r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#);
    s.push_str(r#"<Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/>"#);
    s.push_str(r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#);
    s.push_str("</Types>");
    s
}

fn package_rels() -> String {
    format!(
        concat!(
            "{decl}",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="{base}/officeDocument" Target="word/document.xml"/>"#,
            r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
            "</Relationships>"
        ),
        decl = XML_DECL,
        base = REL_BASE,
    )
}

fn document_rels(image: Option<&BrandingImage>) -> String {
    let mut s = String::from(XML_DECL);
    s.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    s.push_str(&format!(
        r#"<Relationship Id="rIdFooter" Type="{REL_BASE}/footer" Target="footer1.xml"/>"#
    ));
    if let Some(img) = image {
        s.push_str(&format!(
            r#"<Relationship Id="rIdBranding" Type="{REL_BASE}/image" Target="media/{}"/>"#,
            img.part_name()
        ));
    }
    s.push_str("</Relationships>");
    s
}

fn core_props(doc: &Document) -> String {
    format!(
        concat!(
            "{decl}",
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            "<dc:title>{title}</dc:title><dc:creator>deptrack</dc:creator>",
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created>"#,
            "</cp:coreProperties>"
        ),
        decl = XML_DECL,
        title = escape_xml(&doc.title),
        created = doc.created.format("%Y-%m-%dT%H:%M:%SZ"),
    )
}

fn footer_xml() -> String {
    format!(
        concat!(
            "{decl}",
            r#"<w:ftr xmlns:w="{w}"><w:p><w:pPr><w:jc w:val="center"/></w:pPr>"#,
            r#"<w:r><w:t xml:space="preserve">Page </w:t></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
            r#"<w:r><w:instrText xml:space="preserve"> PAGE </w:instrText></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
            r#"<w:r><w:t>1</w:t></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
            "</w:p></w:ftr>"
        ),
        decl = XML_DECL,
        w = NS_W,
    )
}

fn document_xml(doc: &Document) -> String {
    let mut s = String::from(XML_DECL);
    s.push_str(&format!(
        r#"<w:document xmlns:w="{NS_W}" xmlns:r="{NS_R}" xmlns:wp="{NS_WP}" xmlns:a="{NS_A}" xmlns:pic="{NS_PIC}"><w:body>"#
    ));
    for block in &doc.blocks {
        match block {
            Block::Image(img) => write_image(&mut s, img),
            Block::Paragraph(p) => write_paragraph(&mut s, p),
        }
    }
    // A4 portrait, one-inch margins.
    s.push_str(concat!(
        r#"<w:sectPr><w:footerReference w:type="default" r:id="rIdFooter"/>"#,
        r#"<w:pgSz w:w="11906" w:h="16838"/>"#,
        r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/>"#,
        "</w:sectPr></w:body></w:document>"
    ));
    s
}

fn write_paragraph(s: &mut String, p: &Paragraph) {
    s.push_str("<w:p>");
    let has_props = p.space_before > 0 || p.indent > 0 || p.align != Align::Left;
    if has_props {
        // Schema order: spacing, ind, jc.
        s.push_str("<w:pPr>");
        if p.space_before > 0 {
            s.push_str(&format!(r#"<w:spacing w:before="{}"/>"#, p.space_before));
        }
        if p.indent > 0 {
            s.push_str(&format!(r#"<w:ind w:left="{}"/>"#, u32::from(p.indent) * INDENT_STEP));
        }
        if p.align == Align::Center {
            s.push_str(r#"<w:jc w:val="center"/>"#);
        }
        s.push_str("</w:pPr>");
    }
    for run in &p.runs {
        write_run(s, run);
    }
    s.push_str("</w:p>");
}

fn write_run(s: &mut String, run: &Run) {
    s.push_str("<w:r>");
    let has_props = run.bold || run.italic || run.color.is_some() || run.size.is_some() || run.highlight;
    if has_props {
        // Schema order: b, i, color, sz, highlight.
        s.push_str("<w:rPr>");
        if run.bold {
            s.push_str("<w:b/>");
        }
        if run.italic {
            s.push_str("<w:i/>");
        }
        if let Some(color) = run.color {
            s.push_str(&format!(r#"<w:color w:val="{color}"/>"#));
        }
        if let Some(size) = run.size {
            s.push_str(&format!(r#"<w:sz w:val="{size}"/>"#));
        }
        if run.highlight {
            s.push_str(r#"<w:highlight w:val="yellow"/>"#);
        }
        s.push_str("</w:rPr>");
    }
    s.push_str(r#"<w:t xml:space="preserve">"#);
    s.push_str(&escape_xml(&run.text));
    s.push_str("</w:t></w:r>");
}

fn write_image(s: &mut String, img: &BrandingImage) {
    let (cx, cy) = (img.width_emu, img.height_emu);
    let name = img.part_name();
    s.push_str(r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing>"#);
    s.push_str(&format!(
        r#"<wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="1" name="Branding"/>"#
    ));
    s.push_str(&format!(
        r#"<a:graphic><a:graphicData uri="{NS_PIC}"><pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#
    ));
    s.push_str(r#"<pic:blipFill><a:blip r:embed="rIdBranding"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#);
    s.push_str(&format!(
        r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#
    ));
    s.push_str("</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>");
}

/// Read back the paragraph texts of a package produced by [`write_docx`].
///
/// One entry per body paragraph, in order; image paragraphs yield "".
pub fn read_paragraphs(bytes: &[u8]) -> Result<Vec<String>, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    match archive.by_name(DOCUMENT_PART) {
        Ok(mut f) => {
            f.read_to_string(&mut xml)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Err(DocxError::MissingPart(DOCUMENT_PART)),
        Err(e) => return Err(e.into()),
    }
    paragraph_texts(&xml)
}

/// Lists the part names stored in a package.
pub fn part_names(bytes: &[u8]) -> Result<Vec<String>, DocxError> {
    let archive = ZipArchive::new(Cursor::new(bytes))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

fn paragraph_texts(xml: &str) -> Result<Vec<String>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:p" => current = Some(String::new()),
            Event::Empty(e) if e.name().as_ref() == b"w:p" => out.push(String::new()),
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => in_text = false,
            Event::End(e) if e.name().as_ref() == b"w:p" => {
                if let Some(text) = current.take() {
                    out.push(text);
                }
            }
            Event::Text(e) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}
