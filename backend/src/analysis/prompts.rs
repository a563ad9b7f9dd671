use phytoscan_shared::{AdviceMode, PlantNameSource};
use serde_json::{json, Value};

use crate::capability::ModelPrompt;
use crate::intake::AnalysisRequest;

pub const DETECTION_PROMPT: &str = "detect-disease";
pub const ADVICE_PROMPT: &str = "disease-advice";

pub fn detection_prompt(request: &AnalysisRequest, source: PlantNameSource) -> ModelPrompt {
    let mut text = String::from(
        "You are an expert plant pathologist. Analyze the attached photo of a plant leaf \
         and determine whether any disease is present.\n",
    );

    if let Some(plant_name) = &request.plant_name_hint {
        text.push_str(&format!("\nThe user says the plant is: {plant_name}\n"));
    }
    if source == PlantNameSource::Model {
        text.push_str(
            "\nAlso identify the plant: give its common name and its scientific name.\n",
        );
    }

    text.push_str(
        "\nRespond with whether a disease is detected, the name of the disease (empty if \
         the plant is healthy), and your confidence as a number between 0 and 1.",
    );

    ModelPrompt {
        name: DETECTION_PROMPT,
        text,
        image: Some(request.image.clone()),
        output_schema: detection_schema(source),
    }
}

pub fn detection_schema(source: PlantNameSource) -> Value {
    let mut schema = json!({
        "type": "OBJECT",
        "properties": {
            "diseaseDetected": {
                "type": "BOOLEAN",
                "description": "Whether a disease is detected."
            },
            "diseaseName": {
                "type": "STRING",
                "description": "Name of the detected disease, empty if none."
            },
            "confidence": {
                "type": "NUMBER",
                "description": "Confidence of the verdict, between 0 and 1."
            }
        },
        "required": ["diseaseDetected", "diseaseName", "confidence"]
    });

    if source == PlantNameSource::Model {
        schema["properties"]["plantName"] = json!({
            "type": "STRING",
            "description": "Common name of the plant."
        });
        schema["properties"]["scientificName"] = json!({
            "type": "STRING",
            "description": "Scientific (Latin) name of the plant."
        });
    }
    schema
}

pub fn advice_prompt(mode: AdviceMode, plant_name: &str, disease_name: &str) -> ModelPrompt {
    let task = match mode {
        AdviceMode::Prevention => {
            "You are an expert horticulturalist specializing in plant disease prevention. \
             Based on the plant and disease below, provide a concise list of personalized \
             prevention tips."
        }
        AdviceMode::Treatment => {
            "You are an expert horticulturalist specializing in plant disease treatment. \
             Based on the plant and disease below, provide a concise list of practical \
             treatment steps."
        }
    };

    let text = format!(
        "{task}\n\nPlant: {plant_name}\nDisease: {disease_name}\n\n\
         Put one tip per line, each starting with \"- \".\n\n{} Tips:",
        mode.label()
    );

    ModelPrompt {
        name: ADVICE_PROMPT,
        text,
        image: None,
        output_schema: advice_schema(mode),
    }
}

pub fn advice_schema(mode: AdviceMode) -> Value {
    let field = mode.tips_field();
    json!({
        "type": "OBJECT",
        "properties": {
            field: {
                "type": "STRING",
                "description": format!("Newline-separated {} tips for the plant and disease.", mode)
            }
        },
        "required": [field]
    })
}
