use serde::Serialize;

use crate::{
    style::{self, HeatLayerStyle},
    MapConfig, MapInputs, Result,
};

/// How much of the map the document builds on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentContent {
    /// Map, markers or heat layer, user marker and camera.
    Full,
    /// Map and fly-to entry point only. Markers and layers are placed from
    /// outside through the engine the host exposes.
    Shell,
}

/// Self-executing page that rebuilds the whole map inside a sandbox from a
/// snapshot of [`MapInputs`].
#[derive(Debug, Clone)]
pub struct SandboxDocument<'a> {
    pub inputs: &'a MapInputs,
    pub config: &'a MapConfig,
    pub content: DocumentContent,
}

#[derive(Serialize)]
struct Bootstrap<'a> {
    token: &'a str,
    style: &'a str,
    zoom: f64,
    center: [f64; 2],
    moods: &'a [crate::MoodEvent],
    user: Option<[f64; 2]>,
    heatmap: bool,
    render_content: bool,
    colors: &'a [&'static str],
    glyphs: &'a [&'static str],
    user_glyph: &'static str,
    source_id: &'a str,
    layer_id: &'a str,
    paint: serde_json::Value,
    focus: Camera,
    follow: Camera,
}

#[derive(Serialize)]
struct Camera {
    zoom: f64,
    duration: u64,
}

impl SandboxDocument<'_> {
    /// Renders the complete HTML page with the state inlined as JSON.
    pub fn render(&self) -> Result<String> {
        let config = self.config;
        let user_style = style::user_style();
        let bootstrap = Bootstrap {
            token: self.inputs.access_token.trim(),
            style: &config.style_url,
            zoom: config.initial_zoom,
            center: self.inputs.camera_center.to_array(),
            moods: &self.inputs.events,
            user: self.inputs.user_location.map(|c| c.to_array()),
            heatmap: self.inputs.mode.is_heatmap(),
            render_content: self.content == DocumentContent::Full,
            colors: &style::MOOD_COLORS,
            glyphs: &style::MOOD_GLYPHS,
            user_glyph: user_style.glyph,
            source_id: &config.source_id,
            layer_id: &config.heat_layer_id,
            paint: HeatLayerStyle::default().paint(),
            focus: Camera {
                zoom: config.focus.zoom,
                duration: config.focus.duration_ms,
            },
            follow: Camera {
                zoom: config.follow.zoom,
                duration: config.follow.duration_ms,
            },
        };

        let html = TEMPLATE
            .replace("%STYLESHEET%", &config.stylesheet_url())
            .replace("%SCRIPT%", &config.script_url())
            .replace("%USER_COLOR%", user_style.color)
            .replace("%BOOTSTRAP%", &script_json(&bootstrap)?);
        Ok(html)
    }
}

/// JSON that is safe to splice into an inline `<script>` element.
fn script_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

const TEMPLATE: &str = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1, maximum-scale=1"/>
    <link href="%STYLESHEET%" rel="stylesheet" />
    <style>
      html, body, #map { height: 100%; width: 100%; margin: 0; padding: 0; }
      .mood-marker {
        width: 40px; height: 40px; border-radius: 20px;
        display: flex; align-items: center; justify-content: center;
        font-size: 20px; border: 2px solid #fff;
        box-shadow: 0px 2px 4px rgba(0,0,0,0.3); cursor: pointer;
      }
      .user-marker {
        width: 30px; height: 30px; border-radius: 15px;
        background: %USER_COLOR%; display: flex;
        align-items: center; justify-content: center;
        font-size: 16px; border: 2px solid #fff;
        box-shadow: 0px 2px 4px rgba(0,0,0,0.3);
      }
    </style>
  </head>
  <body>
    <div id="map"></div>
    <script src="%SCRIPT%"></script>
    <script>
      const boot = %BOOTSTRAP%;
      mapboxgl.accessToken = boot.token;
      const map = new mapboxgl.Map({ container: 'map', style: boot.style, center: boot.center, zoom: boot.zoom });

      window.flyTo = function (lng, lat, zoom, duration) {
        const camera = {
          center: [lng, lat],
          zoom: zoom === undefined ? boot.focus.zoom : zoom,
          duration: duration === undefined ? boot.focus.duration : duration,
        };
        try { map.flyTo(camera); } catch (e) {}
      };

      function marker(className, text, color, lngLat) {
        const el = document.createElement('div');
        el.className = className;
        if (color) { el.style.backgroundColor = color; }
        el.textContent = text;
        new mapboxgl.Marker(el).setLngLat(lngLat).addTo(map);
      }

      if (boot.render_content) {
        if (!boot.heatmap) {
          boot.moods.forEach(function (m) {
            marker('mood-marker', boot.glyphs[m.mood - 1], boot.colors[m.mood - 1], [m.coords.lng, m.coords.lat]);
          });
          if (boot.user) { marker('user-marker', boot.user_glyph, null, boot.user); }
        } else {
          const data = {
            type: 'FeatureCollection',
            features: boot.moods.map(function (m) {
              return { type: 'Feature', properties: { mood: m.mood }, geometry: { type: 'Point', coordinates: [m.coords.lng, m.coords.lat] } };
            })
          };
          map.on('load', function () {
            if (map.getSource(boot.source_id)) {
              map.getSource(boot.source_id).setData(data);
            } else {
              map.addSource(boot.source_id, { type: 'geojson', data: data });
            }
            if (!map.getLayer(boot.layer_id)) {
              map.addLayer({ id: boot.layer_id, type: 'circle', source: boot.source_id, paint: boot.paint });
            }
          });
        }
        map.flyTo({ center: boot.center, zoom: boot.follow.zoom, duration: boot.follow.duration });
      }
    </script>
  </body>
</html>
"#;
