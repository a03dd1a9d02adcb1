use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Fields, FnArg, Ident, ImplItem, ItemImpl, LitStr, ReturnType, Visibility,
    parse_macro_input, spanned::Spanned,
};

/// Implements `recordform::Record` for a struct with named fields.
///
/// Struct options: `#[record(type_id = "...", name = "...", methods)]`.
/// Field options: `#[record(id, embedded, element_collection, one_to_one,
/// many_to_one, one_to_many, many_to_many, money, transient)]`.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Records the methods declared in an inherent impl block so that
/// `#[record(methods)]` can fold them into the type descriptor.
#[proc_macro_attribute]
pub fn record_methods(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[record_methods] does not accept arguments",
        )
        .to_compile_error()
        .into();
    }

    let input = parse_macro_input!(item as ItemImpl);
    match expand_record_methods(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Record does not support generic structs",
        ));
    }

    let options = parse_record_type_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record requires named fields",
            ));
        }
    };

    let mut members = Vec::<TokenStream2>::new();
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Record requires named fields"))?;
        let field_name = ident.to_string().trim_start_matches("r#").to_string();
        let ty = &field.ty;
        let type_text = quote!(#ty).to_string();

        let mut modifiers = vec![visibility_modifier(&field.vis)];
        modifiers.extend(parse_record_field_options(&field.attrs)?);

        members.push(quote! {
            ::recordform::MemberDescriptor::field(
                #field_name,
                #type_text,
                [#(::recordform::Modifier::#modifiers),*],
            )
        });
    }

    let struct_name_text = struct_name.to_string();
    let type_id_expr = match &options.type_id {
        Some(type_id) => quote! { #type_id.to_string() },
        None => quote! { format!("{}::{}", module_path!(), #struct_name_text) },
    };
    let simple_name = options.name.unwrap_or(struct_name_text);

    let methods_part = if options.methods {
        quote! {
            for method in Self::__recordform_declared_methods() {
                descriptor.push_member(method);
            }
        }
    } else {
        quote!()
    };

    Ok(quote! {
        impl ::recordform::Record for #struct_name {
            fn descriptor() -> ::recordform::TypeDescriptor {
                let mut descriptor = ::recordform::TypeDescriptor::new(#type_id_expr, #simple_name);
                #( descriptor.push_member(#members); )*
                #methods_part
                descriptor
            }
        }
    })
}

fn expand_record_methods(mut item_impl: ItemImpl) -> syn::Result<TokenStream2> {
    if item_impl.trait_.is_some() {
        return Err(syn::Error::new(
            item_impl.span(),
            "#[record_methods] can only be applied to inherent impl blocks",
        ));
    }

    let mut members = Vec::<TokenStream2>::new();
    for item in &item_impl.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        let sig = &method.sig;
        if is_constructor(sig, &item_impl.self_ty) {
            continue;
        }
        let method_name = sig.ident.to_string();

        let mut modifiers = vec![visibility_modifier(&method.vis)];
        let mut params = Vec::<String>::new();
        let mut has_receiver = false;
        for input in &sig.inputs {
            match input {
                FnArg::Receiver(receiver) => {
                    has_receiver = true;
                    if receiver.colon_token.is_some() {
                        let ty = &receiver.ty;
                        params.push(format!("self: {}", quote!(#ty)));
                        continue;
                    }
                    match &receiver.reference {
                        Some(_) if receiver.mutability.is_some() => {
                            modifiers.push(format_ident!("MutReceiver"));
                            params.push("&mut self".to_string());
                        }
                        Some(_) => params.push("&self".to_string()),
                        None => params.push("self".to_string()),
                    }
                }
                FnArg::Typed(typed) => {
                    let ty = &typed.ty;
                    params.push(quote!(#ty).to_string());
                }
            }
        }
        if !has_receiver {
            modifiers.push(format_ident!("Static"));
        }
        if sig.asyncness.is_some() {
            modifiers.push(format_ident!("Async"));
        }
        if sig.constness.is_some() {
            modifiers.push(format_ident!("Const"));
        }
        if sig.unsafety.is_some() {
            modifiers.push(format_ident!("Unsafe"));
        }

        let signature = match &sig.output {
            ReturnType::Default => format!("fn({})", params.join(", ")),
            ReturnType::Type(_, ty) => format!("fn({}) -> {}", params.join(", "), quote!(#ty)),
        };

        members.push(quote! {
            ::recordform::MemberDescriptor::method(
                #method_name,
                #signature,
                [#(::recordform::Modifier::#modifiers),*],
            )
        });
    }

    item_impl.items.push(syn::parse_quote! {
        #[doc(hidden)]
        pub fn __recordform_declared_methods() -> ::std::vec::Vec<::recordform::MemberDescriptor> {
            ::std::vec![#(#members),*]
        }
    });

    Ok(quote!(#item_impl))
}

/// Receiver-less functions returning `Self` build records rather than
/// describe them, so they stay out of the member list.
fn is_constructor(sig: &syn::Signature, self_ty: &syn::Type) -> bool {
    if sig.receiver().is_some() {
        return false;
    }
    let ReturnType::Type(_, output) = &sig.output else {
        return false;
    };
    let syn::Type::Path(output) = output.as_ref() else {
        return false;
    };
    let Some(returned) = output.path.segments.last() else {
        return false;
    };
    if returned.ident == "Self" {
        return true;
    }
    match self_ty {
        syn::Type::Path(self_path) => self_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == returned.ident),
        _ => false,
    }
}

struct RecordTypeOptions {
    type_id: Option<String>,
    name: Option<String>,
    methods: bool,
}

fn parse_record_type_options(attrs: &[syn::Attribute]) -> syn::Result<RecordTypeOptions> {
    let mut options = RecordTypeOptions {
        type_id: None,
        name: None,
        methods: false,
    };

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_id") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(meta.error("type_id must not be empty"));
                }
                options.type_id = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("name") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(meta.error("name must not be empty"));
                }
                options.name = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("methods") {
                options.methods = true;
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[record(...)] option. Supported: type_id = \"...\", name = \"...\", methods",
            ))
        })?;
    }

    Ok(options)
}

const RELATION_OPTIONS: &[(&str, &str)] = &[
    ("embedded", "Embedded"),
    ("element_collection", "ElementCollection"),
    ("one_to_one", "OneToOne"),
    ("many_to_one", "ManyToOne"),
    ("one_to_many", "OneToMany"),
    ("many_to_many", "ManyToMany"),
];

fn parse_record_field_options(attrs: &[syn::Attribute]) -> syn::Result<Vec<Ident>> {
    let mut modifiers = Vec::<Ident>::new();
    let mut relation: Option<&str> = None;

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                modifiers.push(format_ident!("Id"));
                return Ok(());
            }

            if meta.path.is_ident("money") {
                modifiers.push(format_ident!("Money"));
                return Ok(());
            }

            if meta.path.is_ident("transient") {
                modifiers.push(format_ident!("Transient"));
                return Ok(());
            }

            for (option, variant) in RELATION_OPTIONS {
                if meta.path.is_ident(option) {
                    if let Some(existing) = relation {
                        return Err(meta.error(format!(
                            "#[record({option})] conflicts with #[record({existing})]"
                        )));
                    }
                    relation = Some(*option);
                    modifiers.push(format_ident!("{}", variant));
                    return Ok(());
                }
            }

            Err(meta.error(
                "Unsupported #[record(...)] field option. Supported: id, embedded, element_collection, \
                 one_to_one, many_to_one, one_to_many, many_to_many, money, transient",
            ))
        })?;
    }

    Ok(modifiers)
}

fn visibility_modifier(vis: &Visibility) -> Ident {
    match vis {
        Visibility::Public(_) => format_ident!("Public"),
        Visibility::Restricted(restricted) if restricted.path.is_ident("crate") => {
            format_ident!("Crate")
        }
        Visibility::Restricted(_) => format_ident!("Restricted"),
        Visibility::Inherited => format_ident!("Private"),
    }
}
