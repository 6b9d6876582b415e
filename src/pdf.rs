//! Reading image XObjects out of a PDF
//!
//! The walker only needs two things from a document: its page numbers and
//! the image objects reachable from each page. [`ImageSource`] captures
//! that; [`LopdfSource`] implements it on top of `lopdf`.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::color_space::ColorSpaceSpec;
use crate::decoder::{DecodeParams, ImageFilter, ImageObject};
use crate::error::{ExtractError, Result};
use crate::predictor::Predictor;

/// Reference chains deeper than this are treated as malformed
const MAX_COLOR_SPACE_DEPTH: usize = 8;

/// Limit on `/Parent` hops when looking for inherited resources
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// An image XObject found on a page. Conversion failures stay attached to
/// the image so the caller can skip just that one.
#[derive(Debug)]
pub struct PageImage {
    pub id: ObjectId,
    pub image: Result<ImageObject>,
}

/// Page-level access to a document's images
pub trait ImageSource {
    /// 1-based page numbers in document order
    fn page_numbers(&self) -> Vec<u32>;

    /// Image XObjects referenced from a page's resources. Empty when the
    /// page has no resources or no images.
    fn page_images(&self, page_number: u32) -> Vec<PageImage>;
}

/// [`ImageSource`] over a parsed `lopdf` document
pub struct LopdfSource {
    doc: Document,
}

impl LopdfSource {
    pub fn load(path: &Path) -> Result<Self> {
        let doc = Document::load(path)
            .map_err(|e| ExtractError::Pdf(format!("{:?}: {}", path, e)))?;
        Ok(Self { doc })
    }

    pub fn load_mem(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)?;
        Ok(Self { doc })
    }

    pub fn from_document(doc: Document) -> Self {
        Self { doc }
    }

    /// Resolve a reference to get the actual object
    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            _ => Some(obj),
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj)? {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    fn integer(&self, dict: &Dictionary, key: &[u8]) -> Option<i64> {
        match self.resolve(dict.get(key).ok()?)? {
            Object::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Resources for a page, falling back to the ones inherited from the
    /// page tree
    fn page_resources<'a>(&'a self, page_dict: &'a Dictionary) -> Option<&'a Dictionary> {
        let mut current = page_dict;
        for _ in 0..MAX_PAGE_TREE_DEPTH {
            let resources = current
                .get(b"Resources")
                .ok()
                .and_then(|r| self.resolve_dict(r));
            if resources.is_some() {
                return resources;
            }
            current = current
                .get(b"Parent")
                .ok()
                .and_then(|p| self.resolve_dict(p))?;
        }
        None
    }

    /// Collect image XObjects from a resource dictionary, descending into
    /// Form XObjects. Each image is paired with the resources it was found
    /// in, for named color space lookups.
    fn collect_images<'a>(
        &'a self,
        resources: &'a Dictionary,
        images: &mut Vec<(ObjectId, &'a Stream, &'a Dictionary)>,
        seen: &mut HashSet<ObjectId>,
    ) {
        let xobjects = match resources
            .get(b"XObject")
            .ok()
            .and_then(|x| self.resolve_dict(x))
        {
            Some(d) => d,
            None => return,
        };

        for (_, value) in xobjects.iter() {
            let id = match value {
                Object::Reference(id) => *id,
                _ => continue,
            };
            if !seen.insert(id) {
                continue;
            }

            let stream = match self.doc.get_object(id) {
                Ok(Object::Stream(s)) => s,
                _ => continue,
            };

            match stream.dict.get(b"Subtype").ok() {
                Some(Object::Name(n)) if n == b"Image" => images.push((id, stream, resources)),
                Some(Object::Name(n)) if n == b"Form" => {
                    let form_resources = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|r| self.resolve_dict(r))
                        .unwrap_or(resources);
                    self.collect_images(form_resources, images, seen);
                }
                _ => {}
            }
        }
    }

    /// Build an [`ImageObject`] from an image XObject stream
    fn image_object(&self, stream: &Stream, resources: &Dictionary) -> Result<ImageObject> {
        let dict = &stream.dict;

        let width = self.dimension(dict, b"Width")?;
        let height = self.dimension(dict, b"Height")?;

        let is_mask = matches!(
            dict.get(b"ImageMask").ok().and_then(|m| self.resolve(m)),
            Some(Object::Boolean(true))
        );
        let bits = match self.integer(dict, b"BitsPerComponent") {
            Some(n) => u8::try_from(n)
                .map_err(|_| ExtractError::Pdf(format!("invalid /BitsPerComponent {}", n)))?,
            None if is_mask => 1,
            None => 8,
        };

        let color_space = match dict.get(b"ColorSpace").ok() {
            Some(cs) => Some(self.color_space(cs, resources, 0)?),
            None if is_mask => Some(ColorSpaceSpec::DeviceGray),
            None => None,
        };

        let filters = self.filter_names(dict);
        let (filter, data) = self.classify_payload(stream, &filters)?;

        let decode_params = self.decode_params(dict, filters.len());

        let mut image = ImageObject::new(width, height, color_space, filter, data)
            .with_bits_per_component(bits);
        image.decode_params = decode_params;
        Ok(image)
    }

    fn dimension(&self, dict: &Dictionary, key: &[u8]) -> Result<u32> {
        let name = String::from_utf8_lossy(key);
        let value = self
            .integer(dict, key)
            .ok_or_else(|| ExtractError::InvalidDimensions(format!("missing /{}", name)))?;
        match u32::try_from(value) {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(ExtractError::InvalidDimensions(format!(
                "/{} {} is out of range",
                name, value
            ))),
        }
    }

    /// `/Filter` as a list of names (a single name or an array)
    fn filter_names(&self, dict: &Dictionary) -> Vec<Vec<u8>> {
        match dict.get(b"Filter").ok().and_then(|f| self.resolve(f)) {
            Some(Object::Name(n)) => vec![n.clone()],
            Some(Object::Array(arr)) => arr
                .iter()
                .filter_map(|f| match self.resolve(f) {
                    Some(Object::Name(n)) => Some(n.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `/DecodeParms` per filter stage. A single dictionary belongs to the
    /// last stage; references and `null` entries are resolved.
    fn stage_params<'a>(
        &'a self,
        dict: &'a Dictionary,
        filter_count: usize,
    ) -> Vec<Option<&'a Dictionary>> {
        let mut stages = vec![None; filter_count];
        match dict.get(b"DecodeParms").ok().and_then(|p| self.resolve(p)) {
            Some(Object::Array(arr)) => {
                for (stage, entry) in stages.iter_mut().zip(arr) {
                    *stage = self.resolve_dict(entry);
                }
            }
            Some(other) => {
                if let Some(last) = stages.last_mut() {
                    *last = self.resolve_dict(other);
                }
            }
            None => {}
        }
        stages
    }

    fn positive(&self, dict: &Dictionary, key: &[u8], default: usize) -> usize {
        self.integer(dict, key)
            .and_then(|v| usize::try_from(v).ok())
            .filter(|&v| v > 0)
            .unwrap_or(default)
    }

    fn predictor(&self, params: Option<&Dictionary>) -> Predictor {
        let params = match params {
            Some(p) => p,
            None => return Predictor::default(),
        };
        Predictor {
            predictor: self.integer(params, b"Predictor").unwrap_or(1),
            colors: self.positive(params, b"Colors", 1),
            bits_per_component: self.positive(params, b"BitsPerComponent", 8),
            columns: self.positive(params, b"Columns", 1),
        }
    }

    /// Inflate once per stage, undoing each stage's predictor
    fn inflate_stages(
        &self,
        mut data: Vec<u8>,
        params: &[Option<&Dictionary>],
    ) -> Result<Vec<u8>> {
        for stage in params {
            data = self.predictor(*stage).apply(inflate(&data)?)?;
        }
        Ok(data)
    }

    /// Undo leading Flate stages and classify the final one. Raw samples
    /// come back fully inflated; anything else comes back still encoded.
    fn classify_payload(
        &self,
        stream: &Stream,
        filters: &[Vec<u8>],
    ) -> Result<(ImageFilter, Vec<u8>)> {
        let (last, leading) = match filters.split_last() {
            Some(split) => split,
            None => return Ok((ImageFilter::Raw, stream.content.clone())),
        };

        if !leading.iter().all(|f| is_flate(f)) {
            let chain: Vec<String> = filters
                .iter()
                .map(|f| String::from_utf8_lossy(f).to_string())
                .collect();
            return Ok((ImageFilter::Other(chain.join(" + ")), Vec::new()));
        }

        let params = self.stage_params(&stream.dict, filters.len());
        let (leading_params, last_params) = params.split_at(leading.len());
        let data = self.inflate_stages(stream.content.clone(), leading_params)?;

        match ImageFilter::from_name(last) {
            ImageFilter::Raw => Ok((ImageFilter::Raw, self.inflate_stages(data, last_params)?)),
            ImageFilter::Other(name) => Ok((ImageFilter::Other(name), Vec::new())),
            filter => Ok((filter, data)),
        }
    }

    /// Decoded bytes of a stream that may only use Flate filters
    fn flate_stream(&self, stream: &Stream) -> Result<Vec<u8>> {
        let filters = self.filter_names(&stream.dict);
        if !filters.iter().all(|f| is_flate(f)) {
            return Err(ExtractError::Pdf(
                "stream uses a filter other than FlateDecode".to_string(),
            ));
        }
        let params = self.stage_params(&stream.dict, filters.len());
        self.inflate_stages(stream.content.clone(), &params)
    }

    /// `/DecodeParms` for the last filter in the chain
    fn decode_params(&self, dict: &Dictionary, filter_count: usize) -> Option<DecodeParams> {
        let params = self.stage_params(dict, filter_count).pop()??;
        Some(DecodeParams {
            k: self.integer(params, b"K"),
        })
    }

    /// Convert a PDF color space object into a [`ColorSpaceSpec`].
    /// Names that are not device families are looked up in the
    /// `/ColorSpace` resource dictionary.
    fn color_space(
        &self,
        obj: &Object,
        resources: &Dictionary,
        depth: usize,
    ) -> Result<ColorSpaceSpec> {
        if depth > MAX_COLOR_SPACE_DEPTH {
            return Err(ExtractError::UnsupportedColorSpace(
                "color space nesting too deep".to_string(),
            ));
        }

        let obj = self.resolve(obj).ok_or_else(|| {
            ExtractError::UnsupportedColorSpace("dangling color space reference".to_string())
        })?;

        match obj {
            Object::Name(name) => match ColorSpaceSpec::from_name(name) {
                ColorSpaceSpec::Other(label) => {
                    let named = resources
                        .get(b"ColorSpace")
                        .ok()
                        .and_then(|cs| self.resolve_dict(cs))
                        .and_then(|cs| cs.get(name).ok());
                    match named {
                        Some(named) => self.color_space(named, resources, depth + 1),
                        None => Ok(ColorSpaceSpec::Other(label)),
                    }
                }
                spec => Ok(spec),
            },
            Object::Array(arr) => self.color_space_array(arr, resources, depth),
            _ => Err(ExtractError::UnsupportedColorSpace(
                "unexpected color space object".to_string(),
            )),
        }
    }

    fn color_space_array(
        &self,
        arr: &[Object],
        resources: &Dictionary,
        depth: usize,
    ) -> Result<ColorSpaceSpec> {
        let family = match arr.first().and_then(|f| self.resolve(f)) {
            Some(Object::Name(n)) => n.as_slice(),
            _ => {
                return Err(ExtractError::UnsupportedColorSpace(
                    "color space array without a family name".to_string(),
                ))
            }
        };

        match family {
            b"Indexed" | b"I" => {
                let malformed = || {
                    ExtractError::UnsupportedColorSpace("malformed Indexed color space".to_string())
                };
                if arr.len() < 4 {
                    return Err(malformed());
                }
                let base = self.color_space(&arr[1], resources, depth + 1)?;
                let hival = match self.resolve(&arr[2]) {
                    Some(Object::Integer(n)) => u32::try_from(*n).map_err(|_| malformed())?,
                    _ => return Err(malformed()),
                };
                let lookup = match self.resolve(&arr[3]) {
                    Some(Object::String(bytes, _)) => bytes.clone(),
                    Some(Object::Stream(s)) => self.flate_stream(s)?,
                    _ => return Err(malformed()),
                };
                Ok(ColorSpaceSpec::Indexed {
                    base: Box::new(base),
                    hival,
                    lookup,
                })
            }
            b"ICCBased" => {
                let profile = arr.get(1).and_then(|p| self.resolve_dict(p)).ok_or_else(|| {
                    ExtractError::UnsupportedColorSpace("ICCBased without a profile stream".to_string())
                })?;
                let alternate = match profile.get(b"Alternate").ok() {
                    Some(alt) => Some(Box::new(self.color_space(alt, resources, depth + 1)?)),
                    None => None,
                };
                Ok(ColorSpaceSpec::ICCBased { alternate })
            }
            // A bare family wrapped in an array, e.g. [/DeviceRGB]
            other if arr.len() == 1 => Ok(ColorSpaceSpec::from_name(other)),
            other => Ok(ColorSpaceSpec::Other(String::from_utf8_lossy(other).to_string())),
        }
    }
}

impl ImageSource for LopdfSource {
    fn page_numbers(&self) -> Vec<u32> {
        self.doc.get_pages().keys().copied().collect()
    }

    fn page_images(&self, page_number: u32) -> Vec<PageImage> {
        let page_id = match self.doc.get_pages().get(&page_number) {
            Some(&id) => id,
            None => return Vec::new(),
        };
        let page_dict = match self.doc.get_object(page_id) {
            Ok(Object::Dictionary(d)) => d,
            _ => return Vec::new(),
        };
        let resources = match self.page_resources(page_dict) {
            Some(r) => r,
            None => return Vec::new(),
        };

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        self.collect_images(resources, &mut found, &mut seen);

        found
            .into_iter()
            .map(|(id, stream, resources)| PageImage {
                id,
                image: self.image_object(stream, resources),
            })
            .collect()
    }
}

fn is_flate(name: &[u8]) -> bool {
    ImageFilter::from_name(name) == ImageFilter::Raw
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| ExtractError::Pdf(format!("Failed to inflate stream: {}", e)))?;
    Ok(decoded)
}
