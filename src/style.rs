use anyhow::anyhow;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1, take_while_m_n},
    character::complete::char,
    combinator::{all_consuming, map, map_opt, map_res, value},
    sequence::{preceded, tuple},
    IResult,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::pivot::SeriesKey;
use crate::render::ChartKind;
use crate::ChartError;

/// Separator between the parts of a combination key in joined form ("coal|QC").
pub const KEY_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const LIGHT_GRAY: Color = Color::rgb(211, 211, 211);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn named(name: &str) -> Option<Color> {
        let c = match name.to_ascii_lowercase().as_str() {
            "black" | "k" => Color::rgb(0, 0, 0),
            "white" | "w" => Color::rgb(255, 255, 255),
            "red" | "r" => Color::rgb(255, 0, 0),
            "green" | "g" => Color::rgb(0, 128, 0),
            "blue" | "b" => Color::rgb(0, 0, 255),
            "yellow" | "y" => Color::rgb(255, 255, 0),
            "cyan" | "c" => Color::rgb(0, 255, 255),
            "magenta" | "m" => Color::rgb(255, 0, 255),
            "orange" => Color::rgb(255, 165, 0),
            "purple" => Color::rgb(128, 0, 128),
            "brown" => Color::rgb(165, 42, 42),
            "pink" => Color::rgb(255, 192, 203),
            "olive" => Color::rgb(128, 128, 0),
            "navy" => Color::rgb(0, 0, 128),
            "teal" => Color::rgb(0, 128, 128),
            "gray" | "grey" => Color::rgb(128, 128, 128),
            "lightgray" | "lightgrey" => Color::LIGHT_GRAY,
            "darkgray" | "darkgrey" => Color::rgb(169, 169, 169),
            "tab:blue" => Color::rgb(31, 119, 180),
            "tab:orange" => Color::rgb(255, 127, 14),
            "tab:green" => Color::rgb(44, 160, 44),
            "tab:red" => Color::rgb(214, 39, 40),
            "tab:purple" => Color::rgb(148, 103, 189),
            "tab:brown" => Color::rgb(140, 86, 75),
            "tab:pink" => Color::rgb(227, 119, 194),
            "tab:gray" | "tab:grey" => Color::rgb(127, 127, 127),
            "tab:olive" => Color::rgb(188, 189, 34),
            "tab:cyan" => Color::rgb(23, 190, 207),
            _ => return None,
        };
        Some(c)
    }
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |s| u8::from_str_radix(s, 16),
    )(input)
}

fn hex_nibble(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(1, 1, |c: char| c.is_ascii_hexdigit()),
        |s| u8::from_str_radix(s, 16).map(|v| v * 17),
    )(input)
}

fn hex_color(input: &str) -> IResult<&str, Color> {
    preceded(
        char('#'),
        alt((
            map(tuple((hex_byte, hex_byte, hex_byte)), |(r, g, b)| Color::rgb(r, g, b)),
            map(tuple((hex_nibble, hex_nibble, hex_nibble)), |(r, g, b)| Color::rgb(r, g, b)),
        )),
    )(input)
}

fn named_color(input: &str) -> IResult<&str, Color> {
    map_opt(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == ':'),
        Color::named,
    )(input)
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(alt((hex_color, named_color)))(s.trim())
            .map(|(_, color)| color)
            .map_err(|_| anyhow!("Unrecognized color '{}'", s))
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LineDash {
    Solid,
    Dashed,
    DashDot,
    Dotted,
}

fn line_dash(input: &str) -> IResult<&str, LineDash> {
    alt((
        value(LineDash::Dashed, alt((tag("--"), tag("dashed")))),
        value(LineDash::DashDot, alt((tag("-."), tag("dashdot")))),
        value(LineDash::Solid, alt((tag("-"), tag("solid")))),
        value(LineDash::Dotted, alt((tag(":"), tag("dotted")))),
    ))(input)
}

impl FromStr for LineDash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(line_dash)(s.trim())
            .map(|(_, dash)| dash)
            .map_err(|_| anyhow!("Unrecognized line style '{}'", s))
    }
}

impl TryFrom<String> for LineDash {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Marker {
    Point,
    Circle,
    Square,
    TriangleUp,
    TriangleDown,
    Diamond,
    Cross,
    Plus,
    Star,
}

fn marker(input: &str) -> IResult<&str, Marker> {
    alt((
        value(Marker::Point, char('.')),
        value(Marker::Circle, char('o')),
        value(Marker::Square, char('s')),
        value(Marker::TriangleUp, char('^')),
        value(Marker::TriangleDown, char('v')),
        value(Marker::Diamond, char('D')),
        value(Marker::Cross, char('x')),
        value(Marker::Plus, char('+')),
        value(Marker::Star, char('*')),
    ))(input)
}

impl FromStr for Marker {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(marker)(s.trim())
            .map(|(_, m)| m)
            .map_err(|_| anyhow!("Unrecognized marker '{}'", s))
    }
}

impl TryFrom<String> for Marker {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Style values keyed by an explicit category combination.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleMap<T> {
    name: &'static str,
    entries: HashMap<SeriesKey, T>,
}

impl<T> StyleMap<T> {
    pub fn new(name: &'static str) -> Self {
        Self { name, entries: HashMap::new() }
    }

    /// Build from keys in joined form, e.g. `"coal|QC"`.
    pub fn from_joined(name: &'static str, joined: HashMap<String, T>) -> Self {
        let entries = joined
            .into_iter()
            .map(|(k, v)| (k.split(KEY_SEPARATOR).map(|p| p.trim().to_string()).collect(), v))
            .collect();
        Self { name, entries }
    }

    pub fn insert<K, S>(&mut self, key: K, value: T)
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(key.into_iter().map(Into::into).collect(), value);
    }

    pub fn with<K, S>(mut self, key: K, value: T) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &[String]) -> Result<&T, ChartError> {
        self.entries.get(key).ok_or_else(|| ChartError::StyleKeyMissing {
            map: self.name,
            key: join_key(key),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn join_key(key: &[String]) -> String {
    key.join(KEY_SEPARATOR)
}

/// Look up the display label of a raw category value.
pub fn lookup_label<'a>(
    labels: &'a HashMap<String, String>,
    map: &'static str,
    key: &str,
) -> Result<&'a str, ChartError> {
    labels
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ChartError::StyleKeyMissing { map, key: key.to_string() })
}

/// Every caller-supplied style map for one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyles {
    pub colors: StyleMap<Color>,
    pub line_styles: Option<StyleMap<LineDash>>,
    pub line_widths: Option<StyleMap<f64>>,
    pub markers: Option<StyleMap<Marker>>,
}

impl ChartStyles {
    pub fn new(colors: StyleMap<Color>) -> Self {
        Self { colors, line_styles: None, line_widths: None, markers: None }
    }

    pub fn with_line_styles(mut self, styles: StyleMap<LineDash>) -> Self {
        self.line_styles = Some(styles);
        self
    }

    pub fn with_line_widths(mut self, widths: StyleMap<f64>) -> Self {
        self.line_widths = Some(widths);
        self
    }

    pub fn with_markers(mut self, markers: StyleMap<Marker>) -> Self {
        self.markers = Some(markers);
        self
    }

    /// True when lines must be drawn one call per series.
    pub fn has_line_overrides(&self) -> bool {
        self.line_styles.is_some() || self.line_widths.is_some()
    }

    /// Fail on the first drawn column some map does not cover.
    ///
    /// Line-only maps are consulted only for `ChartKind::Line`.
    pub fn check_coverage(&self, columns: &[SeriesKey], kind: ChartKind) -> Result<(), ChartError> {
        for key in columns {
            self.colors.get(key)?;
            if kind == ChartKind::Line {
                if let Some(styles) = &self.line_styles {
                    styles.get(key)?;
                }
                if let Some(widths) = &self.line_widths {
                    widths.get(key)?;
                }
                if let Some(markers) = &self.markers {
                    markers.get(key)?;
                }
            }
        }
        Ok(())
    }
}
