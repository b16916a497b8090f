//! Minimal WKT reading and writing for district geometries.
//!
//! Supports POINT, MULTIPOINT, POLYGON, MULTIPOLYGON and GEOMETRYCOLLECTION,
//! each optionally EMPTY. Z/M ordinates are read and dropped.

use std::fmt::Write;

use anyhow::{anyhow, bail, Result};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiPoint, MultiPolygon, Point, Polygon};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    Open,
    Close,
    Comma,
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => { chars.next(); }
            '(' => { chars.next(); tokens.push(Token::Open) }
            ')' => { chars.next(); tokens.push(Token::Close) }
            ',' => { chars.next(); tokens.push(Token::Comma) }
            c if c.is_ascii_alphabetic() => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_alphabetic() { break }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Word(text[start..end].to_ascii_uppercase()));
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')) { break }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let number = text[start..end].parse::<f64>()
                    .map_err(|_| anyhow!("[io::wkt] Invalid number '{}'", &text[start..end]))?;
                tokens.push(Token::Number(number));
            }
            other => bail!("[io::wkt] Unexpected character '{other}' at offset {start}"),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos) }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => bail!("[io::wkt] Expected {expected:?}, found {other:?}"),
        }
    }

    /// Consume an EMPTY keyword if present.
    fn empty(&mut self) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == "EMPTY") {
            self.pos += 1;
            return true;
        }
        false
    }

    /// Skip a Z, M or ZM dimension marker.
    fn skip_dimension(&mut self) {
        if matches!(self.peek(), Some(Token::Word(w)) if matches!(w.as_str(), "Z" | "M" | "ZM")) {
            self.pos += 1;
        }
    }

    /// Parse a comma-separated, parenthesized list.
    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.expect(Token::Open)?;
        let mut items = vec![item(self)?];
        loop {
            match self.next() {
                Some(Token::Comma) => items.push(item(self)?),
                Some(Token::Close) => return Ok(items),
                other => bail!("[io::wkt] Expected ',' or ')', found {other:?}"),
            }
        }
    }

    fn coord(&mut self) -> Result<Coord<f64>> {
        let (Some(Token::Number(x)), Some(Token::Number(y))) = (self.next(), self.next()) else {
            bail!("[io::wkt] Expected a coordinate pair");
        };
        while matches!(self.peek(), Some(Token::Number(_))) {
            self.pos += 1;
        }
        Ok(Coord { x, y })
    }

    fn ring(&mut self) -> Result<LineString<f64>> {
        Ok(LineString(self.list(Self::coord)?))
    }

    fn polygon_body(&mut self) -> Result<Polygon<f64>> {
        if self.empty() { return Ok(Polygon::new(LineString(vec![]), vec![])) }
        let mut rings = self.list(Self::ring)?.into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString(vec![]));
        Ok(Polygon::new(exterior, rings.collect()))
    }

    /// MULTIPOINT accepts both `(1 2, 3 4)` and `((1 2), (3 4))`.
    fn multipoint_member(&mut self) -> Result<Point<f64>> {
        if matches!(self.peek(), Some(Token::Open)) {
            self.next();
            let coord = self.coord()?;
            self.expect(Token::Close)?;
            Ok(Point(coord))
        } else {
            self.coord().map(Point)
        }
    }

    fn geometry(&mut self) -> Result<Geometry<f64>> {
        let Some(Token::Word(kind)) = self.next() else {
            bail!("[io::wkt] Expected a geometry type");
        };
        self.skip_dimension();

        Ok(match kind.as_str() {
            "POINT" => {
                if self.empty() { return Ok(Geometry::MultiPoint(MultiPoint(vec![]))) }
                self.expect(Token::Open)?;
                let coord = self.coord()?;
                self.expect(Token::Close)?;
                Geometry::Point(Point(coord))
            }
            "MULTIPOINT" => {
                if self.empty() { return Ok(Geometry::MultiPoint(MultiPoint(vec![]))) }
                Geometry::MultiPoint(MultiPoint(self.list(Self::multipoint_member)?))
            }
            "POLYGON" => Geometry::Polygon(self.polygon_body()?),
            "MULTIPOLYGON" => {
                if self.empty() { return Ok(Geometry::MultiPolygon(MultiPolygon(vec![]))) }
                Geometry::MultiPolygon(MultiPolygon(self.list(Self::polygon_body)?))
            }
            "GEOMETRYCOLLECTION" => {
                if self.empty() { return Ok(Geometry::GeometryCollection(GeometryCollection(vec![]))) }
                Geometry::GeometryCollection(GeometryCollection(self.list(Self::geometry)?))
            }
            other => bail!("[io::wkt] Unsupported geometry type '{other}'"),
        })
    }
}

/// Parse a WKT string into a geometry.
pub fn read_wkt(text: &str) -> Result<Geometry<f64>> {
    let mut parser = Parser { tokens: tokenize(text)?, pos: 0 };
    let geometry = parser.geometry()?;
    if parser.pos != parser.tokens.len() {
        bail!("[io::wkt] Trailing content after geometry");
    }
    Ok(geometry)
}

/// Write a geometry as WKT. Lines are written as polygons' rings would be,
/// so only point and areal geometries round-trip.
pub fn write_wkt(geometry: &Geometry<f64>) -> String {
    fn coords<'a>(out: &mut String, coords: impl Iterator<Item = &'a Coord<f64>>) {
        out.push('(');
        for (i, c) in coords.enumerate() {
            if i > 0 { out.push(',') }
            let _ = write!(out, "{} {}", c.x, c.y);
        }
        out.push(')');
    }

    fn polygon(out: &mut String, p: &Polygon<f64>) {
        if p.exterior().0.is_empty() {
            out.push_str("EMPTY");
            return;
        }
        out.push('(');
        for (i, ring) in std::iter::once(p.exterior()).chain(p.interiors()).enumerate() {
            if i > 0 { out.push(',') }
            coords(out, ring.0.iter());
        }
        out.push(')');
    }

    let mut out = String::new();
    match geometry {
        Geometry::Point(p) => {
            let _ = write!(out, "POINT ({} {})", p.x(), p.y());
        }
        Geometry::MultiPoint(mp) if mp.0.is_empty() => out.push_str("MULTIPOINT EMPTY"),
        Geometry::MultiPoint(mp) => {
            out.push_str("MULTIPOINT ");
            coords(&mut out, mp.0.iter().map(|p| &p.0));
        }
        Geometry::Polygon(p) => {
            out.push_str("POLYGON ");
            polygon(&mut out, p);
        }
        Geometry::MultiPolygon(mp) if mp.0.is_empty() => out.push_str("MULTIPOLYGON EMPTY"),
        Geometry::MultiPolygon(mp) => {
            out.push_str("MULTIPOLYGON (");
            for (i, p) in mp.0.iter().enumerate() {
                if i > 0 { out.push(',') }
                polygon(&mut out, p);
            }
            out.push(')');
        }
        Geometry::GeometryCollection(gc) if gc.0.is_empty() => out.push_str("GEOMETRYCOLLECTION EMPTY"),
        Geometry::GeometryCollection(gc) => {
            out.push_str("GEOMETRYCOLLECTION (");
            out.push_str(&gc.0.iter().map(write_wkt).collect::<Vec<_>>().join(","));
            out.push(')');
        }
        Geometry::Rect(r) => return write_wkt(&Geometry::Polygon(r.to_polygon())),
        Geometry::Triangle(t) => return write_wkt(&Geometry::Polygon(t.to_polygon())),
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
            out.push_str("GEOMETRYCOLLECTION EMPTY")
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, point};

    #[test]
    fn reads_point() {
        assert_eq!(read_wkt("POINT (0.00001 0.00001)").unwrap(), Geometry::Point(point!(x: 0.00001, y: 0.00001)));
        assert_eq!(read_wkt("point z (1 2 3)").unwrap(), Geometry::Point(point!(x: 1.0, y: 2.0)));
    }

    #[test]
    fn reads_polygon() {
        let geometry = read_wkt("POLYGON ((-1 -1,-1 1,1 1,1 -1,-1 -1))").unwrap();
        let Geometry::Polygon(polygon) = geometry else { panic!("expected polygon") };
        assert_eq!(polygon.exterior().0.len(), 5);
        assert_eq!(polygon.unsigned_area(), 4.0);
    }

    #[test]
    fn reads_multipolygon_with_hole() {
        let text = "MULTIPOLYGON (((0 0,4 0,4 4,0 4,0 0),(1 1,2 1,2 2,1 2,1 1)),((5 5,6 5,6 6,5 5)))";
        let Geometry::MultiPolygon(mp) = read_wkt(text).unwrap() else { panic!("expected multipolygon") };
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_eq!(mp.unsigned_area(), 16.0 - 1.0 + 0.5);
    }

    #[test]
    fn reads_multipoint_forms() {
        let a = read_wkt("MULTIPOINT (1 2, 3 4)").unwrap();
        let b = read_wkt("MULTIPOINT ((1 2), (3 4))").unwrap();
        assert_eq!(a, b);
        assert_eq!(read_wkt("MULTIPOINT EMPTY").unwrap(), Geometry::MultiPoint(MultiPoint(vec![])));
    }

    #[test]
    fn rejects_garbage() {
        assert!(read_wkt("").is_err());
        assert!(read_wkt("LINESTRING (0 0, 1 1)").is_err());
        assert!(read_wkt("POLYGON ((0 0, 1 1)").is_err());
        assert!(read_wkt("POINT (1 2) extra").is_err());
        assert!(read_wkt("POINT (1 #)").is_err());
    }

    #[test]
    fn writes_readable_wkt() {
        for text in [
            "POINT (1 2)",
            "POLYGON ((0 0,1 0,1 1,0 0))",
            "MULTIPOLYGON (((0 0,1 0,1 1,0 0)),((2 2,3 2,3 3,2 2)))",
            "MULTIPOINT (1 2,3 4)",
            "GEOMETRYCOLLECTION EMPTY",
        ] {
            assert_eq!(write_wkt(&read_wkt(text).unwrap()), text);
        }
    }
}
